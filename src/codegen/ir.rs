// Structured representation of generated source
//
// Generators build modules out of statements; a per-target serializer turns
// them into text. Tests inspect this tree instead of matching strings.

/// Constant values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Hex(u64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Dict(Vec<(String, Literal)>), // ordered
}

impl Literal {
    pub fn str(value: impl Into<String>) -> Self {
        Literal::Str(value.into())
    }

    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Literal)>) -> Self {
        Literal::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Literal::List(_) | Literal::Dict(_))
    }

    /// Look up a key of a dict literal
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Name(String),
    Call {
        func: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    /// Target-syntax expression emitted verbatim
    Raw(String),
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn raw(code: impl Into<String>) -> Self {
        Expr::Raw(code.into())
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.into(),
            args,
            kwargs: Vec::new(),
        }
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Lit(lit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Comment(String),
    Blank,
    Import(String),
    ImportAs {
        module: String,
        alias: String,
    },
    FromImport {
        module: String,
        names: Vec<String>,
    },
    Assign {
        target: String,
        value: Expr,
    },
    Expr(Expr),
    Def {
        name: String,
        params: Vec<String>,
        decorators: Vec<String>,
        doc: Option<String>,
        body: Vec<Stmt>,
    },
    Class {
        name: String,
        base: Option<String>,
        body: Vec<Stmt>,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<(String, Vec<Stmt>)>, // (exception clause, body)
        finally: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Raise(Expr),
    Pass,
}

impl Stmt {
    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::Comment(text.into())
    }

    pub fn import(module: impl Into<String>) -> Self {
        Stmt::Import(module.into())
    }

    pub fn from_import(module: impl Into<String>, names: &[&str]) -> Self {
        Stmt::FromImport {
            module: module.into(),
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn assign(target: impl Into<String>, value: impl Into<Expr>) -> Self {
        Stmt::Assign {
            target: target.into(),
            value: value.into(),
        }
    }

    /// Expression statement written verbatim
    pub fn raw(code: impl Into<String>) -> Self {
        Stmt::Expr(Expr::Raw(code.into()))
    }

    pub fn def(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Stmt::Def {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            decorators: Vec::new(),
            doc: None,
            body,
        }
    }

    pub fn class(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Stmt::Class {
            name: name.into(),
            base: None,
            body,
        }
    }

    pub fn for_in(target: impl Into<String>, iter: impl Into<Expr>, body: Vec<Stmt>) -> Self {
        Stmt::For {
            target: target.into(),
            iter: iter.into(),
            body,
        }
    }

    pub fn if_then(cond: impl Into<Expr>, body: Vec<Stmt>) -> Self {
        Stmt::If {
            cond: cond.into(),
            body,
            orelse: Vec::new(),
        }
    }

    /// Attach a docstring to a `Def`
    pub fn with_doc(mut self, text: impl Into<String>) -> Self {
        if let Stmt::Def { doc, .. } = &mut self {
            *doc = Some(text.into());
        }
        self
    }

    pub fn with_decorator(mut self, decorator: impl Into<String>) -> Self {
        if let Stmt::Def { decorators, .. } = &mut self {
            decorators.push(decorator.into());
        }
        self
    }

    pub fn with_base(mut self, base_class: impl Into<String>) -> Self {
        if let Stmt::Class { base, .. } = &mut self {
            *base = Some(base_class.into());
        }
        self
    }

    /// Direct child statements
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Def { body, .. }
            | Stmt::Class { body, .. }
            | Stmt::For { body, .. }
            | Stmt::While { body, .. } => body.iter().collect(),
            Stmt::If { body, orelse, .. } => body.iter().chain(orelse.iter()).collect(),
            Stmt::Try {
                body,
                handlers,
                finally,
            } => body
                .iter()
                .chain(handlers.iter().flat_map(|(_, h)| h.iter()))
                .chain(finally.iter())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for Expr {
    fn from(code: &str) -> Self {
        Expr::Raw(code.to_string())
    }
}

impl From<String> for Expr {
    fn from(code: String) -> Self {
        Expr::Raw(code)
    }
}

/// One generated source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }

    /// Every statement, depth first
    pub fn walk(&self) -> Vec<&Stmt> {
        let mut out = Vec::new();
        let mut stack: Vec<&Stmt> = self.body.iter().rev().collect();
        while let Some(stmt) = stack.pop() {
            out.push(stmt);
            stack.extend(stmt.children().into_iter().rev());
        }
        out
    }

    /// Whether a function or method named `name` is defined anywhere
    pub fn defines(&self, name: &str) -> bool {
        self.walk()
            .iter()
            .any(|s| matches!(s, Stmt::Def { name: n, .. } | Stmt::Class { name: n, .. } if n == name))
    }

    pub fn imports(&self, module: &str) -> bool {
        self.body.iter().any(|s| match s {
            Stmt::Import(m) | Stmt::ImportAs { module: m, .. } | Stmt::FromImport { module: m, .. } => {
                m == module
            }
            _ => false,
        })
    }

    /// Top-level assignment of a literal value
    pub fn constant(&self, target: &str) -> Option<&Literal> {
        self.body.iter().find_map(|s| match s {
            Stmt::Assign {
                target: t,
                value: Expr::Lit(lit),
            } if t == target => Some(lit),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_reaches_nested_defs() {
        let module = Module::new(vec![
            Stmt::import("time"),
            Stmt::class(
                "ServoController",
                vec![Stmt::def("initialize", &["self"], vec![Stmt::Pass])],
            ),
        ]);
        assert!(module.defines("ServoController"));
        assert!(module.defines("initialize"));
        assert!(!module.defines("cleanup"));
        assert!(module.imports("time"));
        assert_eq!(module.walk().len(), 4);
    }

    #[test]
    fn test_constant_lookup() {
        let module = Module::new(vec![Stmt::assign(
            "CONFIG",
            Literal::dict([("pwm_frequency", Literal::Int(50))]),
        )]);
        let config = module.constant("CONFIG").unwrap();
        assert_eq!(config.get("pwm_frequency"), Some(&Literal::Int(50)));
        assert!(module.constant("OTHER").is_none());
    }
}
