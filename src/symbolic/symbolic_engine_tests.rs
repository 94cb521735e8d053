//___________________________________TESTS____________________________________

#[cfg(test)]
mod evaluation_tests {
    use crate::symbolic::symbolic_engine::{Expr, FuncKind, OpKind};
    use crate::symbolic::symbolic_errors::ErrorKind;
    use crate::symbolic::symbolic_scope::Scope;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_with_bound_variable() {
        let scope = Scope::with_bindings(&[("x", Expr::real(5.0))]);
        let f = Expr::real(2.0) * Expr::var("x") + Expr::real(3.0);
        assert_eq!(f.evaluate(&scope, None), Expr::real(13.0));
    }

    #[test]
    fn test_division_by_zero_is_nan() {
        let r = (Expr::int(1) / Expr::int(0)).simplify();
        assert!(r.is_nan());
        assert_eq!(r.error_kind(), Some(ErrorKind::NotANumber));
    }

    #[test]
    fn test_exact_rationals_and_promotion() {
        let third = Expr::rational(1, 3);
        let sixth = Expr::rational(1, 6);
        assert_eq!((third + sixth).simplify(), Expr::rational(1, 2));
        let big = (Expr::int(i64::MAX) + Expr::int(1)).simplify();
        assert_eq!(big, Expr::real(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_numeric_associativity() {
        let (a, b, c) = (Expr::rational(1, 2), Expr::rational(1, 3), Expr::rational(1, 6));
        let left = (a.clone() + b.clone()) + c.clone();
        let right = a + (b + c);
        assert_eq!(left.simplify(), right.simplify());
        assert_eq!(left.simplify(), Expr::int(1));
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let cases = vec![
            x.clone() + x.clone() + y.clone(),
            Expr::int(3) * x.clone() * Expr::int(2) - y.clone() / y.clone(),
            (x.clone() - y.clone()) * (x.clone() - y.clone()) / x.clone(),
            Expr::call(FuncKind::Sin, x.clone()) / Expr::call(FuncKind::Cos, x.clone()),
        ];
        for f in cases {
            let once = f.simplify();
            assert_eq!(once.simplify(), once, "{} is not stable", once);
        }
    }

    #[test]
    fn test_simplified_tree_keeps_its_value() {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let f = (x.clone() + Expr::int(1)) * (x.clone() + Expr::int(1)) - y.clone() * x.clone()
            + x.clone() / y.clone();
        let simplified = f.simplify();
        for (vx, vy) in [(0.5, 2.0), (-1.5, 3.0), (4.0, -0.25)] {
            assert_relative_eq!(
                f.eval_expression(&["x", "y"], &[vx, vy]),
                simplified.eval_expression(&["x", "y"], &[vx, vy]),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_errors_propagate_leftmost() {
        let left = Expr::type_mismatch("left");
        let f = left.clone() + Expr::nan();
        assert_eq!(f.simplify(), left);
        let g = Expr::call(FuncKind::Sin, Expr::out_of_bounds("inner"));
        assert_eq!(g.simplify().error_kind(), Some(ErrorKind::IndexOutOfBounds));
    }

    #[test]
    fn test_complex_roots() {
        let r = Expr::call(FuncKind::Sqrt, Expr::int(-4)).simplify();
        assert_eq!(r, Expr::complex_int(0, 2));
    }

    #[test]
    fn test_array_arithmetic() {
        let a = Expr::array(vec![Expr::int(1), Expr::int(2)]);
        let b = Expr::array(vec![Expr::int(3), Expr::int(4)]);
        assert_eq!(
            (a.clone() + b).simplify(),
            Expr::array(vec![Expr::int(4), Expr::int(6)])
        );
        assert_eq!(
            (a.clone() * Expr::int(3)).simplify(),
            Expr::array(vec![Expr::int(3), Expr::int(6)])
        );
        let short = Expr::array(vec![Expr::int(1)]);
        assert_eq!(
            (a + short).simplify().error_kind(),
            Some(ErrorKind::IndexOutOfBounds)
        );
    }

    #[test]
    fn test_logic_short_circuits() {
        // the right operand would be a type mismatch if it were evaluated
        let bad = Expr::unary(OpKind::Not, Expr::int(3));
        let or = Expr::binary(OpKind::Or, Expr::boolean(true), bad.clone());
        assert_eq!(or.simplify(), Expr::boolean(true));
        let and = Expr::binary(OpKind::And, Expr::boolean(false), bad);
        assert_eq!(and.simplify(), Expr::boolean(false));
    }

    #[test]
    fn test_eval_expression() {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let f = x.pow(Expr::int(2)) + y;
        assert_relative_eq!(f.eval_expression(&["x", "y"], &[2.0, 1.0]), 5.0);
        assert!(f.eval_expression(&["x"], &[2.0]).is_nan());
    }
}

#[cfg(test)]
mod collapse_tests {
    use crate::symbolic::symbolic_engine::{Expr, OpKind};
    use crate::symbolic::symbolic_numbers::Number;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    /// A positive Int, Rational or Real leaf together with its value.
    fn random_leaf(rng: &mut StdRng, exact_only: bool) -> (Expr, f64) {
        let kinds = if exact_only { 2 } else { 3 };
        match rng.random_range(0..kinds) {
            0 => {
                let v = rng.random_range(1..=9);
                (Expr::int(v), v as f64)
            }
            1 => {
                let (p, q) = (rng.random_range(1..=9), rng.random_range(2..=7));
                (Expr::rational(p, q), p as f64 / q as f64)
            }
            _ => {
                let v = rng.random_range(1..=40_i32) as f64 / 4.0;
                (Expr::real(v), v)
            }
        }
    }

    /// Random binary nesting of `leaves` under `op`, leaf order kept.
    fn random_tree(leaves: &[Expr], op: OpKind, rng: &mut StdRng) -> Expr {
        if leaves.len() == 1 {
            return leaves[0].clone();
        }
        let split = rng.random_range(1..leaves.len());
        Expr::binary(
            op,
            random_tree(&leaves[..split], op, rng),
            random_tree(&leaves[split..], op, rng),
        )
    }

    fn value(e: &Expr) -> f64 {
        e.as_number()
            .and_then(Number::to_f64)
            .unwrap_or_else(|| panic!("{} is not a number", e))
    }

    /// The numeric partner of `x` in a collapsed `n op x`.
    fn coefficient(e: &Expr, op: OpKind, x: &Expr) -> f64 {
        if e == x {
            return if op == OpKind::Add { 0.0 } else { 1.0 };
        }
        match e.as_op(op) {
            Some([a, b]) if b == x => value(a),
            Some([a, b]) if a == x => value(b),
            _ => panic!("{} did not collapse", e),
        }
    }

    #[test]
    fn test_mixed_leaves_collapse_in_any_nesting() {
        let mut rng = StdRng::seed_from_u64(7);
        let x = Expr::var("x");
        for _ in 0..50 {
            let size = rng.random_range(2..=8);
            let (mut leaves, values): (Vec<Expr>, Vec<f64>) =
                (0..size).map(|_| random_leaf(&mut rng, false)).unzip();
            let cases = [
                (OpKind::Add, values.iter().sum::<f64>()),
                (OpKind::Mul, values.iter().product::<f64>()),
            ];
            for (op, expected) in cases {
                leaves.shuffle(&mut rng);
                let number = random_tree(&leaves, op, &mut rng).simplify();
                assert_relative_eq!(value(&number), expected, max_relative = 1e-12);

                let mut with_x = leaves.clone();
                let at = rng.random_range(0..=with_x.len());
                with_x.insert(at, x.clone());
                let collected = random_tree(&with_x, op, &mut rng).simplify();
                assert_relative_eq!(coefficient(&collected, op, &x), expected, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_exact_leaves_collapse_to_one_number() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let size = rng.random_range(2..=8);
            let mut leaves: Vec<Expr> = (0..size).map(|_| random_leaf(&mut rng, true).0).collect();
            for op in [OpKind::Add, OpKind::Mul] {
                let first = random_tree(&leaves, op, &mut rng).simplify();
                leaves.shuffle(&mut rng);
                let second = random_tree(&leaves, op, &mut rng).simplify();
                assert!(first.is_number(), "{} is not a number", first);
                assert_eq!(first, second);
            }
        }
    }
}

#[cfg(test)]
mod control_tests {
    use crate::symbolic::symbolic_caches::NameId;
    use crate::symbolic::symbolic_controller::Controller;
    use crate::symbolic::symbolic_engine::{Expr, FuncKind, OpKind};
    use crate::symbolic::symbolic_errors::ErrorKind;
    use crate::symbolic::symbolic_scope::Scope;
    use crate::Utils::task_parser::CalcConfig;
    use std::str::FromStr;
    use std::thread;
    use std::time::Duration;

    fn var(name: &str) -> Expr {
        Expr::var(name)
    }

    fn increment(name: &str) -> Expr {
        Expr::assign(var(name), var(name) + Expr::int(1))
    }

    #[test]
    fn test_if_selects_branch() {
        let f = Expr::if_then_else(
            Expr::binary(OpKind::Greater, var("x"), Expr::int(0)),
            Expr::int(1),
            Expr::int(2),
        );
        let scope = Scope::with_bindings(&[("x", Expr::int(3))]);
        assert_eq!(f.evaluate(&scope, None), Expr::int(1));
        // symbolic condition keeps the node
        assert_eq!(f.simplify(), f);
        let bad = Expr::if_then_else(Expr::int(5), Expr::int(1), Expr::int(2));
        assert_eq!(bad.simplify().error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_while_counts() {
        let ctrl = Controller::new().with_loops(true);
        let scope = Scope::with_bindings(&[("i", Expr::int(0))]);
        let f = Expr::while_loop(
            Expr::binary(OpKind::Less, var("i"), Expr::int(5)),
            increment("i"),
        );
        assert_eq!(f.evaluate(&scope, Some(&ctrl)), Expr::int(5));
        assert_eq!(scope.lookup(NameId::intern("i")), Some(Expr::int(5)));
        // a body that never runs
        let never = Expr::while_loop(Expr::boolean(false), Expr::int(1));
        assert!(never.evaluate(&scope, Some(&ctrl)).is_nan());
    }

    #[test]
    fn test_loops_need_the_capability() {
        let f = Expr::while_loop(Expr::boolean(true), Expr::int(1));
        assert_eq!(f.simplify(), f);
        let ctrl = Controller::new();
        assert_eq!(f.simplify_with(Some(&ctrl)), f);
        let s = Expr::sum(var("k"), var("k"), Expr::int(1), Expr::int(3));
        assert_eq!(s.simplify(), s);
    }

    #[test]
    fn test_while_is_cancelled_from_another_thread() {
        let ctrl = Controller::permissive();
        let handle = ctrl.stop_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.stop();
        });
        let scope = Scope::with_bindings(&[("i", Expr::int(0))]);
        let f = Expr::while_loop(Expr::boolean(true), increment("i"));
        let result = f.evaluate(&scope, Some(&ctrl));
        stopper.join().unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(result, Expr::cancelled("Stopped"));
    }

    #[test]
    fn test_for_uses_its_own_frame() {
        let ctrl = Controller::new().with_loops(true);
        let scope = Scope::with_bindings(&[("s", Expr::int(0))]);
        let f = Expr::for_loop(
            Expr::assign(var("i"), Expr::int(0)),
            Expr::binary(OpKind::Less, var("i"), Expr::int(4)),
            increment("i"),
            Expr::assign(var("s"), var("s") + var("i")),
        );
        assert_eq!(f.evaluate(&scope, Some(&ctrl)), Expr::int(6));
        assert_eq!(scope.lookup(NameId::intern("s")), Some(Expr::int(6)));
        assert_eq!(scope.lookup(NameId::intern("i")), None);
    }

    #[test]
    fn test_sum_of_squares() {
        let ctrl = Controller::new().with_loops(true);
        let k = var("k");
        let f = Expr::sum(k.clone().pow(Expr::int(2)), k, Expr::int(1), Expr::int(4));
        assert_eq!(f.simplify_with(Some(&ctrl)), Expr::int(30));
    }

    #[test]
    fn test_sleep() {
        let ctrl = Controller::new();
        let nap = Expr::sleep(Expr::real(0.005));
        assert_eq!(nap.simplify_with(Some(&ctrl)), Expr::boolean(true));
        ctrl.stop_handle().stop();
        assert_eq!(nap.simplify_with(Some(&ctrl)), Expr::cancelled("Interrupted"));
        let negative = Expr::sleep(Expr::int(-1));
        assert_eq!(negative.simplify().error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_sleep_past_the_instant_range() {
        let endless = Expr::sleep(Expr::real(1e19));
        let ctrl = Controller::new();
        ctrl.stop_handle().stop();
        assert_eq!(endless.simplify_with(Some(&ctrl)), Expr::cancelled("Interrupted"));

        let ctrl = Controller::new();
        let handle = ctrl.stop_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.stop();
        });
        let result = endless.simplify_with(Some(&ctrl));
        stopper.join().unwrap();
        assert_eq!(result, Expr::cancelled("Interrupted"));

        // nothing could interrupt it
        assert_eq!(endless.simplify().error_kind(), Some(ErrorKind::IndexOutOfBounds));
    }

    #[test]
    fn test_assign_defines_locally() {
        let scope = Scope::new();
        let f = Expr::assign(var("y"), Expr::int(2) + Expr::int(3));
        assert_eq!(f.evaluate(&scope, None), Expr::int(5));
        assert_eq!(scope.lookup(NameId::intern("y")), Some(Expr::int(5)));
    }

    #[test]
    fn test_random_list_gate() {
        let f = Expr::call(FuncKind::RandList, Expr::int(3));
        assert_eq!(f.simplify(), f);
        let ctrl = Controller::permissive();
        let list = f.simplify_with(Some(&ctrl));
        assert_eq!(list.as_array().map(<[Expr]>::len), Some(3));
    }

    #[test]
    fn test_scratch_lists_are_pooled() {
        let ctrl = Controller::new().with_pool_capacity(4);
        let (x, y) = (var("x"), var("y"));
        let f = x.clone() + y.clone() + x.clone() * Expr::int(2) + Expr::int(1);
        f.simplify_with(Some(&ctrl));
        assert!(ctrl.pooled() > 0);
        assert!(ctrl.pooled() <= 4);
    }

    #[test]
    fn test_controller_from_config_runs_loops() {
        let config = CalcConfig::from_str("controller\n allow_loops: true").unwrap();
        let ctrl = Controller::from_config(&config);
        let scope = Scope::with_bindings(&[("i", Expr::int(0))]);
        let f = Expr::while_loop(
            Expr::binary(OpKind::Less, var("i"), Expr::int(3)),
            increment("i"),
        );
        assert_eq!(f.evaluate(&scope, Some(&ctrl)), Expr::int(3));
    }
}

#[cfg(test)]
mod pipeline_tests {
    use crate::symbolic::symbolic_dedup::{flatten, inline};
    use crate::symbolic::symbolic_engine::{Expr, FuncKind};
    use crate::symbolic::symbolic_scope::Scope;
    use approx::assert_relative_eq;

    #[test]
    fn test_diff_node_differentiates_before_binding() {
        let x = Expr::var("x");
        let d = Expr::call2(FuncKind::Diff, x.clone().pow(Expr::int(2)), x);
        let scope = Scope::with_bindings(&[("x", Expr::int(3))]);
        assert_eq!(d.evaluate(&scope, None), Expr::int(6));
    }

    #[test]
    fn test_solve_node_ignores_outer_binding() {
        let x = Expr::var("x");
        let eq = Expr::equation(Expr::int(2) * x.clone() + Expr::int(3), Expr::int(7));
        let node = Expr::call2(FuncKind::Solve, eq, x.clone());
        let scope = Scope::with_bindings(&[("x", Expr::int(10))]);
        assert_eq!(node.evaluate(&scope, None), Expr::equation(x, Expr::int(2)));
    }

    #[test]
    fn test_dedup_round_trip_keeps_values() {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let product = x.clone() * y.clone();
        let f = Expr::call(FuncKind::Sin, product.clone()) * Expr::call(FuncKind::Cos, product.clone())
            + product.clone()
            - Expr::call(FuncKind::Sin, product);
        let mut vars = Vec::new();
        let mut subtrees = Vec::new();
        let flat = flatten(&f, &mut vars, &mut subtrees).unwrap();
        assert!(!vars.is_empty());
        let restored = inline(&flat, &vars, &subtrees).simplify();
        for (vx, vy) in [(0.3, 1.7), (-2.0, 0.5)] {
            assert_relative_eq!(
                f.eval_expression(&["x", "y"], &[vx, vy]),
                restored.eval_expression(&["x", "y"], &[vx, vy]),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_derivative_of_gradient_is_deduplicated() {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let f = Expr::call(FuncKind::Sin, x.clone() * y.clone());
        let grad = Expr::array(f.diff_multi());
        let mut vars = Vec::new();
        let mut subtrees = Vec::new();
        let flat = flatten(&grad, &mut vars, &mut subtrees).unwrap();
        // cos(x*y) appears in both partial derivatives
        assert!(subtrees.contains(&Expr::call(FuncKind::Cos, x * y)));
        assert!(flat.to_string().contains("tmpvar"));
    }
}
