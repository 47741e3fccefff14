//! Wire types for the external record store.
//!
//! Field names here follow the external store's schema, not the local one.
//! The local-to-external translation lives with the reconciler; this module
//! only fixes the shape of what goes over the wire.

use serde::{Deserialize, Serialize};

/// A record as returned by the external store.
///
/// `id` is the store's internal identity and differs from the shared key
/// (`clave`) carried in the payload fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalOrder {
    pub id: String,
    #[serde(flatten)]
    pub fields: ExternalOrderPayload,
}

/// The mutable field set of an external record.
///
/// Absent fields are omitted from the serialized body entirely, so a partial
/// payload never blanks values the external store already holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalOrderPayload {
    /// Shared key correlating this record with the local order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clave: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cedula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombres: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apellidos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empresa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genero: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edad: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_examen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medico: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hora: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recomendaciones: Option<String>,
    /// Local commit version last applied to this record. Used to discard
    /// stale mirror attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}
