use spn_rs::circuit::Circuit;
use spn_rs::learn::LearnConfig;
use spn_rs::storer::Storer;
use spn_rs::varset::VarSet;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    // R = 0.3·P1 + 0.7·P2, with the leaves over X2 and X3 shared by both components.
    let mut c = Circuit::new();
    let f1 = c.add_multinomial(0, vec![0.9, 0.1]);
    let f2 = c.add_multinomial(1, vec![0.6, 0.4]);
    let y11 = c.add_multinomial(2, vec![0.8, 0.2]);
    let y12 = c.add_multinomial(2, vec![0.3, 0.7]);
    let y21 = c.add_multinomial(3, vec![0.4, 0.6]);
    let y22 = c.add_multinomial(3, vec![0.9, 0.1]);

    let mut mix = |a, wa, b, wb| -> color_eyre::Result<_> {
        let s = c.add_sum();
        c.add_weighted_child(s, a, wa)?;
        c.add_weighted_child(s, b, wb)?;
        Ok(s)
    };
    let s1 = mix(y11, 0.6, y12, 0.4)?;
    let s2 = mix(y11, 0.2, y12, 0.8)?;
    let s3 = mix(y21, 0.9, y22, 0.1)?;
    let s4 = mix(y21, 0.5, y22, 0.5)?;

    let p1 = c.add_product();
    for child in [f1, s1, s3] {
        c.add_child(p1, child)?;
    }
    let p2 = c.add_product();
    for child in [s2, s4, f2] {
        c.add_child(p2, child)?;
    }
    let root = c.add_sum();
    c.add_weighted_child(root, p1, 0.3)?;
    c.add_weighted_child(root, p2, 0.7)?;
    println!("circuit = {:?}", c);
    println!("height = {}, edges = {}", c.height(root)?, c.num_edges(root));
    println!("induced trees = {}", c.count_induced_trees(root)?);

    let evidence = VarSet::from([(0, 0), (1, 0), (2, 0), (3, 0)]);
    let lp = c.evaluate(root, &evidence)?;
    println!("log P(X = 0) = {:.4} (P = {:.4})", lp, lp.exp());

    let (mpe, value) = c.evaluate_map(root, &VarSet::new())?;
    println!("MAP = {:?} with log value {:.4}", mpe, value);

    let mut storer = Storer::new();
    let inf = c.store_inference(root, &evidence, &mut storer, None)?;
    let grads = c.differentiate(root, &mut storer, inf)?;
    for i in 0..2 {
        println!("dS/dw[R, {}] = {:.4}", i, grads.weight_gradient(&storer, root, i)?.exp());
    }

    println!("{}", c.to_text(root));

    let data: Vec<VarSet> = (0..16usize)
        .map(|bits| (0..4u32).map(|v| (v.into(), (bits >> v) & 1)).collect())
        .collect();
    let report = c.learn_weights(root, &data, &LearnConfig::hard_em())?;
    println!(
        "hard EM: {} epochs, log-likelihood {:.4}, converged = {}",
        report.epochs, report.log_likelihood, report.converged
    );

    Ok(())
}
