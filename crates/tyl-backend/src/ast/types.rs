//! Types produced by the (out-of-scope) type checker.
//!
//! The backend never infers types; it only reads them off AST nodes that the
//! checker has already annotated. `Type` is deliberately flat — no unification
//! variables, no generics-as-values — because by the time this crate sees the
//! AST, monomorphization inputs are already known (see [`crate::monomorphize`]).

use std::fmt;

/// A source-language type, as attached to AST nodes by the external checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type {
    I64,
    F64,
    Bool,
    Str,
    Unit,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Record(String),
    Closure { params: Vec<Type>, ret: Box<Type> },
    TraitObject(String),
    Result(Box<Type>, Box<Type>),
    Channel(Box<Type>),
    Mutex(Box<Type>),
    RwLock(Box<Type>),
    Atomic,
    Future(Box<Type>),
    /// An unresolved generic parameter; only ever seen before monomorphization.
    Generic(String),
}

impl Type {
    pub fn is_float(&self) -> bool {
        matches!(self, Type::F64)
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_))
    }

    /// Every value that isn't a float rides in a GPR; this is the condition
    /// the expression lowerer uses to pick the GPR or XMM path.
    pub fn is_gpr_resident(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I64 => write!(f, "i64"),
            Type::F64 => write!(f, "f64"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Unit => write!(f, "()"),
            Type::List(t) => write!(f, "list<{t}>"),
            Type::Map(k, v) => write!(f, "map<{k},{v}>"),
            Type::Record(name) => write!(f, "{name}"),
            Type::Closure { params, ret } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::TraitObject(name) => write!(f, "dyn {name}"),
            Type::Result(ok, err) => write!(f, "Result<{ok},{err}>"),
            Type::Channel(t) => write!(f, "Channel<{t}>"),
            Type::Mutex(t) => write!(f, "Mutex<{t}>"),
            Type::RwLock(t) => write!(f, "RwLock<{t}>"),
            Type::Atomic => write!(f, "Atomic"),
            Type::Future(t) => write!(f, "Future<{t}>"),
            Type::Generic(name) => write!(f, "{name}"),
        }
    }
}

/// A concrete type argument list for one generic instantiation, keyed by the
/// monomorphizer (external collaborator, see `crate::monomorphize`).
pub type TypeArgs = Vec<Type>;
