#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, ExprId, Stmt};
    use rox::resolver::{Locals, Resolver};
    use rox::scanner::scan_all;

    fn parse_source(source: &str) -> Vec<Stmt> {
        let (tokens, lex_errors) = scan_all(source.as_bytes());
        let (program, parse_errors) = rox::parse(tokens);

        assert!(lex_errors.is_empty() && parse_errors.is_empty());
        program
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        let program = parse_source(source);
        let (_, errors) = rox::resolve(&program);

        errors.iter().map(ToString::to_string).collect()
    }

    /// Every resolvable reference in source order, as (name, id).
    fn references(program: &[Stmt]) -> Vec<(String, ExprId)> {
        let mut out = Vec::new();
        for stmt in program {
            walk_stmt(stmt, &mut out);
        }
        out
    }

    fn walk_stmt(stmt: &Stmt, out: &mut Vec<(String, ExprId)>) {
        match stmt {
            Stmt::Expression(e) | Stmt::Print(e) => walk_expr(e, out),
            Stmt::Var { initializer, .. } => {
                if let Some(e) = initializer {
                    walk_expr(e, out);
                }
            }
            Stmt::Block(stmts) => stmts.iter().for_each(|s| walk_stmt(s, out)),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                walk_expr(condition, out);
                walk_stmt(then_branch, out);
                if let Some(s) = else_branch {
                    walk_stmt(s, out);
                }
            }
            Stmt::While { condition, body } => {
                walk_expr(condition, out);
                walk_stmt(body, out);
            }
            Stmt::Function(decl) => decl.body.iter().for_each(|s| walk_stmt(s, out)),
            Stmt::Return { value, .. } => {
                if let Some(e) = value {
                    walk_expr(e, out);
                }
            }
            Stmt::Class {
                superclass,
                methods,
                ..
            } => {
                if let Some(e) = superclass {
                    walk_expr(e, out);
                }
                for method in methods {
                    method.body.iter().for_each(|s| walk_stmt(s, out));
                }
            }
        }
    }

    fn walk_expr(expr: &Expr, out: &mut Vec<(String, ExprId)>) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Grouping(e) | Expr::Unary { right: e, .. } => walk_expr(e, out),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                walk_expr(left, out);
                walk_expr(right, out);
            }
            Expr::Variable { id, name } => out.push((name.lexeme.clone(), *id)),
            Expr::Assign { id, name, value } => {
                walk_expr(value, out);
                out.push((name.lexeme.clone(), *id));
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                walk_expr(callee, out);
                arguments.iter().for_each(|a| walk_expr(a, out));
            }
            Expr::Get { object, .. } => walk_expr(object, out),
            Expr::Set { object, value, .. } => {
                walk_expr(object, out);
                walk_expr(value, out);
            }
            Expr::This { id, .. } => out.push(("this".into(), *id)),
            Expr::Super { id, .. } => out.push(("super".into(), *id)),
        }
    }

    /// Distances of every reference in source order (`None` = global).
    fn distances(source: &str) -> Vec<(String, Option<usize>)> {
        let program = parse_source(source);
        let (locals, errors) = Resolver::new().resolve(&program);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        distances_in(&program, &locals)
    }

    fn distances_in(program: &[Stmt], locals: &Locals) -> Vec<(String, Option<usize>)> {
        references(program)
            .into_iter()
            .map(|(name, id)| (name, locals.get(&id).copied()))
            .collect()
    }

    fn d(name: &str, distance: Option<usize>) -> (String, Option<usize>) {
        (name.to_string(), distance)
    }

    #[test]
    fn test_globals_are_not_recorded() {
        assert_eq!(
            distances("var a = 1; print a; a = 2;"),
            vec![d("a", None), d("a", None)]
        );
    }

    #[test]
    fn test_block_distances() {
        assert_eq!(
            distances("{ var a = 1; { var b = a; print a + b; } print a; }"),
            vec![d("a", Some(1)), d("a", Some(1)), d("b", Some(0)), d("a", Some(0))]
        );
    }

    #[test]
    fn test_shadowing_picks_innermost() {
        assert_eq!(
            distances("var a = \"global\"; { var a = \"outer\"; { var a = \"inner\"; print a; } print a; } print a;"),
            vec![d("a", Some(0)), d("a", Some(0)), d("a", None)]
        );
    }

    #[test]
    fn test_closure_distances() {
        assert_eq!(
            distances("fun outer(p) { var x = p; fun inner() { return x + p; } return inner; }"),
            vec![d("p", Some(0)), d("x", Some(1)), d("p", Some(1)), d("inner", Some(0))]
        );
    }

    #[test]
    fn test_this_and_super_distances() {
        assert_eq!(
            distances("class A { m() { return this; } } class B < A { m() { return super.m; } }"),
            vec![d("this", Some(1)), d("A", None), d("super", Some(2))]
        );
    }

    #[test]
    fn test_resolving_twice_is_deterministic() {
        let program = parse_source(
            "fun f(a) { { var b = a; fun g() { return a + b; } return g; } } class C { m() { return this; } }",
        );

        let (first, _) = rox::resolve(&program);
        let (second, _) = rox::resolve(&program);

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            resolve_errors("var a = 1; { var a = a + 1; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );

        // At global scope this is permitted.
        assert_eq!(resolve_errors("var a = 1; var a = a + 1;"), Vec::<String>::new());
    }

    #[test]
    fn test_duplicate_local() {
        assert_eq!(
            resolve_errors("{ var a = 1; var a = 2; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
        assert_eq!(
            resolve_errors("fun f(a, a) {}"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_invalid_returns() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
        assert_eq!(
            resolve_errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );
        assert_eq!(
            resolve_errors("class A { init() { return; } }"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_misplaced_this_and_super() {
        assert_eq!(
            resolve_errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
        assert_eq!(
            resolve_errors("fun f() { return super.m; }"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );
        assert_eq!(
            resolve_errors("class A { m() { return super.m; } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_eq!(
            resolve_errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_all_errors_are_collected() {
        assert_eq!(
            resolve_errors("return;\nprint this;\n{ var x; var x; }"),
            vec![
                "[line 1] Error at 'return': Can't return from top-level code.",
                "[line 2] Error at 'this': Can't use 'this' outside of a class.",
                "[line 3] Error at 'x': Already a variable with this name in this scope.",
            ]
        );
    }
}
