//! Data-source backends.

pub mod canned;
pub mod docs;
pub mod logs;
pub mod network;
pub mod platform;
pub mod portal;
pub mod warehouse;
pub mod webhook;

use lt_domain::{ParamBag, ParamValue};

/// Read a string parameter the registry has already validated.
pub(crate) fn str_param<'a>(params: &'a ParamBag, name: &str) -> Option<&'a str> {
    params.get(name).and_then(ParamValue::as_str)
}

/// Read an integer parameter the registry has already validated.
pub(crate) fn int_param(params: &ParamBag, name: &str) -> Option<i64> {
    params.get(name).and_then(ParamValue::as_int)
}
