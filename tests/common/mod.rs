#![allow(dead_code)]

use spn_rs::circuit::Circuit;
use spn_rs::reference::NodeId;

/// Named nodes of the four-variable circuit built by [`worked_example`].
pub struct Example {
    pub circuit: Circuit,
    pub root: NodeId,
    pub p1: NodeId,
    pub p2: NodeId,
    pub s1: NodeId,
    pub s2: NodeId,
    pub s3: NodeId,
    pub s4: NodeId,
    pub shared_leaves: [NodeId; 4],
}

/// `R = 0.3·P1 + 0.7·P2` over binary `X0..X3`, where
///
/// - `P1 = f1(X0) · S1(X2) · S3(X3)`, `P2 = S2(X2) · S4(X3) · f2(X1)`;
/// - `S1 = 0.6·Y11 + 0.4·Y12`, `S2 = 0.2·Y11 + 0.8·Y12` share the leaves over `X2`;
/// - `S3 = 0.9·Y21 + 0.1·Y22`, `S4 = 0.5·Y21 + 0.5·Y22` share the leaves over `X3`.
pub fn worked_example() -> Example {
    let mut c = Circuit::new();

    let f1 = c.add_multinomial(0, vec![0.9, 0.1]);
    let f2 = c.add_multinomial(1, vec![0.6, 0.4]);
    let y11 = c.add_multinomial(2, vec![0.8, 0.2]);
    let y12 = c.add_multinomial(2, vec![0.3, 0.7]);
    let y21 = c.add_multinomial(3, vec![0.4, 0.6]);
    let y22 = c.add_multinomial(3, vec![0.9, 0.1]);

    let mix = |c: &mut Circuit, a: NodeId, wa: f64, b: NodeId, wb: f64| {
        let s = c.add_sum();
        c.add_weighted_child(s, a, wa).unwrap();
        c.add_weighted_child(s, b, wb).unwrap();
        s
    };
    let s1 = mix(&mut c, y11, 0.6, y12, 0.4);
    let s2 = mix(&mut c, y11, 0.2, y12, 0.8);
    let s3 = mix(&mut c, y21, 0.9, y22, 0.1);
    let s4 = mix(&mut c, y21, 0.5, y22, 0.5);

    let p1 = c.add_product();
    for child in [f1, s1, s3] {
        c.add_child(p1, child).unwrap();
    }
    let p2 = c.add_product();
    for child in [s2, s4, f2] {
        c.add_child(p2, child).unwrap();
    }

    let root = mix(&mut c, p1, 0.3, p2, 0.7);

    Example {
        circuit: c,
        root,
        p1,
        p2,
        s1,
        s2,
        s3,
        s4,
        shared_leaves: [y11, y12, y21, y22],
    }
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} within {}, got {}",
        expected,
        tol,
        actual
    );
}
