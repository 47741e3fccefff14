//! Local-to-external field mapping.
//!
//! The two stores name their fields differently. This is the single
//! declarative translation for orders, shared by the create and update
//! paths so the two can never drift apart.

use intake_mirror::ExternalOrderPayload;

use crate::models::{Order, OrderStatus};

/// Local column → external field, for every attribute with an external
/// counterpart. Attributes absent here have no external counterpart and are
/// never mirrored.
pub const ORDER_FIELD_MAP: &[(&str, &str)] = &[
    ("shared_key", "clave"),
    ("subject_id", "cedula"),
    ("first_name", "nombres"),
    ("last_name", "apellidos"),
    ("employer_code", "empresa"),
    ("phone", "telefono"),
    ("email", "email"),
    ("sex", "genero"),
    ("age", "edad"),
    ("exam_type", "tipo_examen"),
    ("provider", "medico"),
    ("scheduled_date", "fecha"),
    ("scheduled_time", "hora"),
    ("status", "estado"),
    ("observations", "observaciones"),
    ("recommendations", "recomendaciones"),
    ("version", "version"),
];

fn estado_for(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pendiente",
        OrderStatus::Attended => "atendido",
    }
}

/// Translate a committed order into the external payload.
///
/// The input is always the full post-commit row, so a partial local update
/// still mirrors a complete record and never blanks external fields.
pub fn external_payload(order: &Order) -> ExternalOrderPayload {
    ExternalOrderPayload {
        clave: Some(order.shared_key.clone()),
        cedula: Some(order.subject_id.clone()),
        nombres: Some(order.first_name.clone()),
        apellidos: Some(order.last_name.clone()),
        empresa: order.employer_code.clone(),
        telefono: order.phone.clone(),
        email: order.email.clone(),
        genero: order.sex.clone(),
        edad: order.age,
        tipo_examen: Some(order.exam_type.clone()),
        medico: order.provider.clone(),
        fecha: Some(order.scheduled_date.clone()),
        hora: Some(order.scheduled_time.clone()),
        estado: Some(estado_for(order.status).to_string()),
        observaciones: order.observations.clone(),
        recomendaciones: order.recommendations.clone(),
        version: Some(order.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        let mut order = Order::new(
            "415117423".into(),
            "Ana".into(),
            "Mora".into(),
            "audiometria".into(),
            "2024-03-11".into(),
            "09:00".into(),
        );
        order.sex = Some("F".into());
        order.age = Some(40);
        order.provider = Some("Dra. Rivas".into());
        order
    }

    #[test]
    fn test_mapping_is_total() {
        let payload = external_payload(&sample_order());
        let json = serde_json::to_value(&payload).unwrap();
        let externals: Vec<&str> = ORDER_FIELD_MAP.iter().map(|(_, e)| *e).collect();

        // Every serialized key must be declared in the mapping table
        for key in json.as_object().unwrap().keys() {
            assert!(
                externals.contains(&key.as_str()),
                "field {key} missing from ORDER_FIELD_MAP"
            );
        }
    }

    #[test]
    fn test_external_naming_and_status() {
        let payload = external_payload(&sample_order());

        assert_eq!(payload.cedula.as_deref(), Some("415117423"));
        assert_eq!(payload.genero.as_deref(), Some("F"));
        assert_eq!(payload.edad, Some(40));
        assert_eq!(payload.medico.as_deref(), Some("Dra. Rivas"));
        assert_eq!(payload.estado.as_deref(), Some("pendiente"));
        assert_eq!(payload.version, Some(1));

        let mut attended = sample_order();
        attended.status = OrderStatus::Attended;
        assert_eq!(
            external_payload(&attended).estado.as_deref(),
            Some("atendido")
        );
    }

    #[test]
    fn test_locally_absent_fields_stay_absent() {
        let mut order = sample_order();
        order.observations = None;
        order.employer_code = None;

        let payload = external_payload(&order);
        assert!(payload.observaciones.is_none());
        assert!(payload.empresa.is_none());
    }
}
