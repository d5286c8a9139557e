// Python serializer for generated modules
//
// 4-space indentation, PEP 8 blank lines around functions and classes,
// single-quoted strings. Output is a pure function of the module tree.

use std::fmt::Write;

use super::ir::{Expr, Literal, Module, Stmt};

const INDENT: &str = "    ";

/// Render a module to source text (always ends with a newline)
pub fn render(module: &Module) -> String {
    let mut out = String::new();
    render_block(&mut out, &module.body, 0);
    out
}

fn render_block(out: &mut String, stmts: &[Stmt], depth: usize) {
    if stmts.is_empty() {
        line(out, depth, "pass");
        return;
    }
    // Blank lines separating definitions: two at module level, one inside classes
    let separator = if depth == 0 { 2 } else { 1 };
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 {
            let prev = &stmts[i - 1];
            if is_definition(stmt) || is_definition(prev) {
                // Explicit blank statements already count toward the gap
                let existing = trailing_blanks(&stmts[..i]);
                for _ in existing..separator {
                    out.push('\n');
                }
            }
        }
        render_stmt(out, stmt, depth);
    }
}

fn is_definition(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Def { .. } | Stmt::Class { .. })
}

fn trailing_blanks(stmts: &[Stmt]) -> usize {
    stmts.iter().rev().take_while(|s| matches!(s, Stmt::Blank)).count()
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn render_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match stmt {
        Stmt::Comment(text) => {
            if text.starts_with('!') {
                line(out, depth, &format!("#{}", text));
            } else {
                line(out, depth, &format!("# {}", text));
            }
        }
        Stmt::Blank => out.push('\n'),
        Stmt::Import(module) => line(out, depth, &format!("import {}", module)),
        Stmt::ImportAs { module, alias } => {
            line(out, depth, &format!("import {} as {}", module, alias))
        }
        Stmt::FromImport { module, names } => line(
            out,
            depth,
            &format!("from {} import {}", module, names.join(", ")),
        ),
        Stmt::Assign { target, value } => {
            let value = expr(value, depth);
            line(out, depth, &format!("{} = {}", target, value));
        }
        Stmt::Expr(e) => line(out, depth, &expr(e, depth)),
        Stmt::Def {
            name,
            params,
            decorators,
            doc,
            body,
        } => {
            for decorator in decorators {
                line(out, depth, &format!("@{}", decorator));
            }
            line(out, depth, &format!("def {}({}):", name, params.join(", ")));
            if let Some(doc) = doc {
                line(out, depth + 1, &format!("\"\"\"{}\"\"\"", doc));
                if body.is_empty() {
                    return;
                }
            }
            render_block(out, body, depth + 1);
        }
        Stmt::Class { name, base, body } => {
            match base {
                Some(base) => line(out, depth, &format!("class {}({}):", name, base)),
                None => line(out, depth, &format!("class {}:", name)),
            }
            render_block(out, body, depth + 1);
        }
        Stmt::For { target, iter, body } => {
            line(out, depth, &format!("for {} in {}:", target, expr(iter, depth)));
            render_block(out, body, depth + 1);
        }
        Stmt::While { cond, body } => {
            line(out, depth, &format!("while {}:", expr(cond, depth)));
            render_block(out, body, depth + 1);
        }
        Stmt::If { .. } => render_if(out, stmt, depth, "if"),
        Stmt::Try {
            body,
            handlers,
            finally,
        } => {
            line(out, depth, "try:");
            render_block(out, body, depth + 1);
            for (clause, handler) in handlers {
                line(out, depth, &format!("except {}:", clause));
                render_block(out, handler, depth + 1);
            }
            if !finally.is_empty() {
                line(out, depth, "finally:");
                render_block(out, finally, depth + 1);
            }
        }
        Stmt::Return(None) => line(out, depth, "return"),
        Stmt::Return(Some(value)) => line(out, depth, &format!("return {}", expr(value, depth))),
        Stmt::Raise(value) => line(out, depth, &format!("raise {}", expr(value, depth))),
        Stmt::Pass => line(out, depth, "pass"),
    }
}

fn render_if(out: &mut String, stmt: &Stmt, depth: usize, keyword: &str) {
    let Stmt::If { cond, body, orelse } = stmt else {
        return;
    };
    line(out, depth, &format!("{} {}:", keyword, expr(cond, depth)));
    render_block(out, body, depth + 1);
    match orelse.as_slice() {
        [] => {}
        [nested @ Stmt::If { .. }] => render_if(out, nested, depth, "elif"),
        _ => {
            line(out, depth, "else:");
            render_block(out, orelse, depth + 1);
        }
    }
}

fn expr(e: &Expr, depth: usize) -> String {
    match e {
        Expr::Lit(lit) => literal(lit, depth),
        Expr::Name(name) => name.clone(),
        Expr::Raw(code) => code.clone(),
        Expr::Call { func, args, kwargs } => {
            let mut parts: Vec<String> = args.iter().map(|a| expr(a, depth)).collect();
            parts.extend(kwargs.iter().map(|(k, v)| format!("{}={}", k, expr(v, depth))));
            format!("{}({})", func, parts.join(", "))
        }
    }
}

/// Short scalar-only dicts stay on one line
const INLINE_DICT_MAX: usize = 3;

fn literal(lit: &Literal, depth: usize) -> String {
    match lit {
        Literal::None => "None".to_string(),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::Hex(n) => format!("0x{:x}", n),
        Literal::Float(f) => float(*f),
        Literal::Str(s) => string(s),
        Literal::List(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            if items.iter().all(Literal::is_scalar) {
                let parts: Vec<String> = items.iter().map(|i| literal(i, depth)).collect();
                return format!("[{}]", parts.join(", "));
            }
            let mut s = String::from("[\n");
            for item in items {
                indent(&mut s, depth + 1);
                let _ = writeln!(s, "{},", literal(item, depth + 1));
            }
            indent(&mut s, depth);
            s.push(']');
            s
        }
        Literal::Dict(entries) => {
            if entries.is_empty() {
                return "{}".to_string();
            }
            if entries.len() <= INLINE_DICT_MAX && entries.iter().all(|(_, v)| v.is_scalar()) {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", string(k), literal(v, depth)))
                    .collect();
                return format!("{{{}}}", parts.join(", "));
            }
            let mut s = String::from("{\n");
            for (k, v) in entries {
                indent(&mut s, depth + 1);
                let _ = writeln!(s, "{}: {},", string(k), literal(v, depth + 1));
            }
            indent(&mut s, depth);
            s.push('}');
            s
        }
    }
}

fn indent(s: &mut String, depth: usize) {
    for _ in 0..depth {
        s.push_str(INDENT);
    }
}

fn float(f: f64) -> String {
    if f.is_nan() {
        "float('nan')".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "float('inf')".to_string()
        } else {
            "float('-inf')".to_string()
        }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        // Shortest representation that round-trips, same as Python's repr
        format!("{}", f)
    }
}

fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(literal(&Literal::Bool(true), 0), "True");
        assert_eq!(literal(&Literal::None, 0), "None");
        assert_eq!(literal(&Literal::Hex(0x40), 0), "0x40");
        assert_eq!(literal(&Literal::Float(90.0), 0), "90.0");
        assert_eq!(literal(&Literal::Float(0.8), 0), "0.8");
        assert_eq!(literal(&Literal::Float(-2.5), 0), "-2.5");
        assert_eq!(literal(&Literal::str("it's"), 0), "'it\\'s'");
        assert_eq!(
            literal(&Literal::List(vec![Literal::Int(1), Literal::Int(2)]), 0),
            "[1, 2]"
        );
    }

    #[test]
    fn test_nested_dict_is_multiline() {
        let lit = Literal::dict([
            ("name", Literal::str("A")),
            (
                "points",
                Literal::List(vec![Literal::dict([
                    ("angle", Literal::Float(10.0)),
                    ("delay", Literal::Int(5)),
                ])]),
            ),
        ]);
        let expected = "{\n    'name': 'A',\n    'points': [\n        {'angle': 10.0, 'delay': 5},\n    ],\n}";
        assert_eq!(literal(&lit, 0), expected);
    }

    #[test]
    fn test_render_function_with_control_flow() {
        let module = Module::new(vec![
            Stmt::import("time"),
            Stmt::def(
                "run",
                &["controller"],
                vec![Stmt::for_in(
                    "_",
                    "range(2)",
                    vec![Stmt::If {
                        cond: Expr::raw("controller.ready"),
                        body: vec![Stmt::raw("controller.step()")],
                        orelse: vec![Stmt::Pass],
                    }],
                )],
            )
            .with_doc("Run twice"),
        ]);
        let expected = "\
import time


def run(controller):
    \"\"\"Run twice\"\"\"
    for _ in range(2):
        if controller.ready:
            controller.step()
        else:
            pass
";
        assert_eq!(render(&module), expected);
    }

    #[test]
    fn test_elif_chain_and_try() {
        let module = Module::new(vec![Stmt::Try {
            body: vec![Stmt::If {
                cond: Expr::raw("a"),
                body: vec![Stmt::raw("x()")],
                orelse: vec![Stmt::if_then("b", vec![Stmt::raw("y()")])],
            }],
            handlers: vec![("Exception as e".to_string(), vec![Stmt::raw("print(e)")])],
            finally: vec![Stmt::raw("done()")],
        }]);
        let expected = "\
try:
    if a:
        x()
    elif b:
        y()
except Exception as e:
    print(e)
finally:
    done()
";
        assert_eq!(render(&module), expected);
    }

    #[test]
    fn test_class_methods_separated_by_one_blank_line() {
        let module = Module::new(vec![Stmt::class(
            "Servo",
            vec![
                Stmt::def("a", &["self"], vec![]),
                Stmt::def("b", &["self"], vec![Stmt::Return(None)]),
            ],
        )]);
        assert_eq!(
            render(&module),
            "class Servo:\n    def a(self):\n        pass\n\n    def b(self):\n        return\n"
        );
    }

    #[test]
    fn test_shebang_comment() {
        let module = Module::new(vec![Stmt::comment("!/usr/bin/env python3")]);
        assert_eq!(render(&module), "#!/usr/bin/env python3\n");
    }
}
