//! Utilities for working with panic payloads.
//!
//! Panics raised by the execution engine or inside subscription tasks are
//! caught and logged; these helpers turn the payload into readable text.

use std::any::Any;

/// Extract a message from a `panic!` payload.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else {
        format!("{payload:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payloads_are_extracted() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        let borrowed: Box<dyn Any + Send> = Box::new("bang");
        assert_eq!(panic_message(owned.as_ref()), "boom");
        assert_eq!(panic_message(borrowed.as_ref()), "bang");
    }

    #[test]
    fn other_payloads_fall_back_to_debug() {
        let payload: Box<dyn Any + Send> = Box::new(5_u32);
        assert!(panic_message(payload.as_ref()).contains("Any"));
    }
}
