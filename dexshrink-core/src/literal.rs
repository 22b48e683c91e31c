use crate::DexType;
use std::fmt;

/// A numeric or null constant as produced by `const` instructions.
#[derive(Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl Literal {
    pub fn get_type(&self) -> DexType {
        match self {
            Literal::Int(_) => DexType::INT,
            Literal::Long(_) => DexType::LONG,
            Literal::Float(_) => DexType::FLOAT,
            Literal::Double(_) => DexType::DOUBLE,
            Literal::Null => DexType::OBJECT,
        }
    }

    /// The value of an integral literal.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Literal::Int(v) => Some(v as i64),
            Literal::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Literal::Int(v) => v == 0,
            Literal::Long(v) => v == 0,
            Literal::Float(v) => v == 0.0,
            Literal::Double(v) => v == 0.0,
            Literal::Null => true,
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::Float(v) => write!(f, "{}f", v),
            Literal::Double(v) => write!(f, "{}d", v),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_types() {
        assert_eq!(Literal::Int(1).get_type(), DexType::INT);
        assert_eq!(Literal::Long(1).get_type(), DexType::LONG);
        assert_eq!(Literal::Null.get_type(), DexType::OBJECT);
    }

    #[test]
    fn test_integral_values() {
        assert_eq!(Literal::Int(-3).as_i64(), Some(-3));
        assert_eq!(Literal::Long(1 << 40).as_i64(), Some(1 << 40));
        assert_eq!(Literal::Float(1.0).as_i64(), None);
        assert!(Literal::Int(0).is_zero());
        assert!(!Literal::Long(7).is_zero());
        assert!(Literal::Null.is_null());
    }
}
