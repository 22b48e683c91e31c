mod r#type;
pub use r#type::*;

mod literal;
pub use literal::*;

pub mod item_factory;
pub use item_factory::DexItemFactory;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name() {
        assert_eq!(DexType::INT.to_string(), "I");
        assert_eq!(DexType::OBJECT.to_source_string(), "java.lang.Object");
    }

    #[test]
    fn test_type_equality() {
        assert_eq!(DexType::new("LFoo;"), DexType::new("LFoo;"));
        assert_ne!(DexType::new("LFoo;"), DexType::new("LBar;"));
    }

    #[test]
    fn test_member_refs() {
        let field = FieldRef::parse("LFoo;->x:I").unwrap();
        assert_eq!(field.holder, DexType::new("LFoo;"));
        assert_eq!(field.name, "x");
        assert_eq!(field.ty, DexType::INT);

        let method = MethodRef::parse("LFoo;-><init>(I)V").unwrap();
        assert_eq!(method.name, "<init>");
        assert_eq!(method.proto.parameters(), vec![DexType::INT]);
        assert_eq!(method.proto.return_type(), DexType::VOID);
    }
}
