//! The type universe (§4.3) and the structural subtyping relation over it.

use ahash::AHashMap;

/// One inhabitant of the type universe. Compared structurally, not
/// nominally, except for the fast-path identity check in [`is_subtype`].
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The bottom type: no value has it, so `Never <: X` is always false.
    Never,
    /// The top type: every value has it, so `X <: Any` is always true.
    Any,
    Simple(SimpleType),
    Functor(FunctorType),
    Generic(GenericType),
    Union(Box<Type>, Box<Type>),
    Interface(InterfaceType),
    /// A type-parameter placeholder bound inside a generic declaration's body.
    GenericDef { extends: Option<Box<Type>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    pub name: String,
    pub fields: AHashMap<String, Type>,
    pub methods: AHashMap<String, Type>,
    pub generics: Vec<String>,
    pub super_type: Option<Box<Type>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctorType {
    pub args: Vec<Type>,
    pub generics: Vec<String>,
    pub ret: Box<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericType {
    pub target: Box<Type>,
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub fields: AHashMap<String, Type>,
    pub methods: AHashMap<String, Type>,
    pub super_type: Option<Box<Type>>,
    pub generics: Vec<String>,
}

impl Type {
    pub fn name(&self) -> String {
        match self {
            Self::Never => "Never".to_string(),
            Self::Any => "Any".to_string(),
            Self::Simple(s) => s.name.clone(),
            Self::Functor(f) => {
                let args: Vec<_> = f.args.iter().map(Type::name).collect();
                format!("({}) => {}", args.join(", "), f.ret.name())
            }
            Self::Generic(g) => {
                let args: Vec<_> = g.args.iter().map(Type::name).collect();
                format!("{}<{}>", g.target.name(), args.join(", "))
            }
            Self::Union(l, r) => format!("{} | {}", l.name(), r.name()),
            Self::Interface(_) => "interface".to_string(),
            Self::GenericDef { .. } => "T".to_string(),
        }
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(SimpleType { name: name.into(), fields: AHashMap::new(), methods: AHashMap::new(), generics: Vec::new(), super_type: None })
    }
}

/// Structural subtype check (§4.3):
/// 1. Identity is always true; `Never` is bottom, `Any` is top.
/// 2. A generic instance unwraps to its target before comparing.
/// 3. `SimpleType` compares by walking `sub`'s super chain.
/// 4. `FunctorType` checks arity, contravariant args, covariant return.
/// 5. `UnionType` super succeeds if `sub` fits either side.
/// 6. `InterfaceType` super is structural: every field/method in `sup` must
///    exist in `sub` with a compatible type.
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }
    if matches!(sub, Type::Never) {
        return true;
    }
    if matches!(sup, Type::Any) {
        return true;
    }
    if matches!(sub, Type::Any) {
        return false;
    }
    if let Type::Generic(g) = sub {
        return is_subtype(&g.target, sup);
    }
    match sup {
        Type::Union(left, right) => is_subtype(sub, left) || is_subtype(sub, right),
        Type::Simple(sup_simple) => simple_is_subtype(sub, sup_simple),
        Type::Functor(sup_fn) => functor_is_subtype(sub, sup_fn),
        Type::Interface(sup_iface) => interface_is_subtype(sub, sup_iface),
        Type::Generic(g) => is_subtype(sub, &g.target),
        Type::Never | Type::Any | Type::GenericDef { .. } => false,
    }
}

fn simple_is_subtype(sub: &Type, sup: &SimpleType) -> bool {
    let Type::Simple(mut cur) = sub.clone() else { return false };
    loop {
        if cur.name == sup.name {
            return true;
        }
        match cur.super_type {
            Some(next) => match *next {
                Type::Simple(next_simple) => cur = next_simple,
                _ => return false,
            },
            None => return false,
        }
    }
}

fn functor_is_subtype(sub: &Type, sup: &FunctorType) -> bool {
    let Type::Functor(sub_fn) = sub else { return false };
    if sub_fn.args.len() != sup.args.len() {
        return false;
    }
    // Contravariant in parameters: the sub-function must accept everything
    // the super-function's signature promises to pass it.
    let args_ok = sub_fn.args.iter().zip(&sup.args).all(|(sub_arg, sup_arg)| is_subtype(sup_arg, sub_arg));
    args_ok && is_subtype(&sub_fn.ret, &sup.ret)
}

fn interface_is_subtype(sub: &Type, sup: &InterfaceType) -> bool {
    let (sub_fields, sub_methods): (&AHashMap<String, Type>, &AHashMap<String, Type>) = match sub {
        Type::Simple(s) => (&s.fields, &s.methods),
        Type::Interface(i) => (&i.fields, &i.methods),
        _ => return false,
    };
    let fields_ok = sup.fields.iter().all(|(name, ty)| sub_fields.get(name).is_some_and(|sub_ty| is_subtype(sub_ty, ty)));
    let methods_ok = sup.methods.iter().all(|(name, ty)| sub_methods.get(name).is_some_and(|sub_ty| is_subtype(sub_ty, ty)));
    fields_ok && methods_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_and_bottom_top() {
        let number = Type::simple("Number");
        assert!(is_subtype(&number, &number));
        assert!(is_subtype(&Type::Never, &number));
        assert!(!is_subtype(&number, &Type::Never));
        assert!(is_subtype(&number, &Type::Any));
    }

    #[test]
    fn simple_walks_the_super_chain() {
        let animal = SimpleType { name: "Animal".into(), fields: AHashMap::new(), methods: AHashMap::new(), generics: Vec::new(), super_type: None };
        let dog = Type::Simple(SimpleType {
            name: "Dog".into(),
            fields: AHashMap::new(),
            methods: AHashMap::new(),
            generics: Vec::new(),
            super_type: Some(Box::new(Type::Simple(animal.clone()))),
        });
        assert!(is_subtype(&dog, &Type::Simple(animal)));
        assert!(!is_subtype(&Type::simple("Cat"), &dog));
    }

    #[test]
    fn functor_checks_contravariant_args_covariant_return() {
        let narrow_to_wide = Type::Functor(FunctorType { args: vec![Type::Any], generics: Vec::new(), ret: Box::new(Type::simple("Number")) });
        let wide_to_narrow = Type::Functor(FunctorType { args: vec![Type::simple("Number")], generics: Vec::new(), ret: Box::new(Type::Any) });
        assert!(is_subtype(&narrow_to_wide, &wide_to_narrow));
        assert!(!is_subtype(&wide_to_narrow, &narrow_to_wide));
    }

    #[test]
    fn interface_subtyping_is_structural() {
        let mut fields = AHashMap::new();
        fields.insert("name".to_string(), Type::simple("String"));
        let iface = InterfaceType { fields, methods: AHashMap::new(), super_type: None, generics: Vec::new() };

        let mut dog_fields = AHashMap::new();
        dog_fields.insert("name".to_string(), Type::simple("String"));
        dog_fields.insert("breed".to_string(), Type::simple("String"));
        let dog = Type::Simple(SimpleType { name: "Dog".into(), fields: dog_fields, methods: AHashMap::new(), generics: Vec::new(), super_type: None });

        assert!(is_subtype(&dog, &Type::Interface(iface)));
    }
}
