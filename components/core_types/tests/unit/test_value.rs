//! Unit tests for the boxed Value representation

use core_types::{ObjRef, Value, ValueKind};
use proptest::prelude::*;

#[cfg(test)]
mod value_kind_tests {
    use super::*;

    #[test]
    fn test_kind_of_nil() {
        assert_eq!(Value::NIL.kind(), ValueKind::Nil);
        assert_eq!(Value::default().kind(), ValueKind::Nil);
    }

    #[test]
    fn test_kind_of_bools() {
        assert_eq!(Value::bool(true).kind(), ValueKind::Bool(true));
        assert_eq!(Value::from(false).kind(), ValueKind::Bool(false));
    }

    #[test]
    fn test_kind_of_object() {
        let obj = ObjRef::new(7, 3);
        assert_eq!(Value::from(obj).kind(), ValueKind::Object(obj));
        assert_eq!(obj.index(), 7);
        assert_eq!(obj.generation(), 3);
    }

    #[test]
    fn test_object_is_not_number() {
        let v = Value::object(ObjRef::new(0, 0));
        assert_eq!(v.as_number(), None);
        assert_eq!(v.as_bool(), None);
        assert!(!v.is_nil());
    }
}

#[cfg(test)]
mod value_equality_tests {
    use super::*;

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Value::object(ObjRef::new(1, 0));
        let b = Value::object(ObjRef::new(1, 1));
        assert_eq!(a, Value::object(ObjRef::new(1, 0)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_number_never_equals_bool() {
        assert_ne!(Value::number(1.0), Value::TRUE);
        assert_ne!(Value::number(0.0), Value::FALSE);
        assert_ne!(Value::number(0.0), Value::NIL);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every non-NaN double survives boxing bit for bit.
    #[test]
    fn number_bits_round_trip(bits in any::<u64>()) {
        let n = f64::from_bits(bits);
        prop_assume!(!n.is_nan());
        let v = Value::number(n);
        prop_assert!(v.is_number());
        prop_assert_eq!(v.as_number().map(f64::to_bits), Some(bits));
    }

    /// NaN payloads never decode as anything but a number.
    #[test]
    fn nan_payloads_stay_numbers(payload in 1u64..(1u64 << 51), negative in any::<bool>()) {
        let sign = if negative { 1u64 << 63 } else { 0 };
        let n = f64::from_bits(sign | 0x7ff0_0000_0000_0000 | payload);
        prop_assert!(n.is_nan());
        let v = Value::number(n);
        prop_assert!(v.is_number());
        prop_assert!(!v.is_object());
        prop_assert!(!v.is_bool());
        prop_assert!(!v.is_nil());
    }

    #[test]
    fn handles_round_trip(index in any::<u32>(), generation in any::<u16>()) {
        let obj = ObjRef::new(index, generation);
        prop_assert_eq!(Value::object(obj).as_object(), Some(obj));
    }
}
