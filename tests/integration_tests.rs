//! Integration tests for oops-lstm.

use oops_lstm::{
    AffectPolicy, Channel, ConfigurationError, Endpoint, EvaluationError, Evaluator,
    MutationContext, Node, OopsConfig, OopsTrainer, Port, SequenceEvaluator, SolutionStore,
    StructuralError, Topology, TrainerBuilder,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn small_config() -> OopsConfig {
    OopsConfig {
        max_solutions: 50,
        mutants_per_epoch: 100,
        ..OopsConfig::default()
    }
}

fn hi_trainer(seed: u64, config: OopsConfig) -> OopsTrainer<SequenceEvaluator> {
    let grid = Topology::lstm_grid(4).unwrap();
    let evaluator = SequenceEvaluator::for_grid(&grid, "Hi");
    TrainerBuilder::new()
        .topology(grid.topology)
        .evaluator(evaluator)
        .config(config)
        .build(&mut ChaCha8Rng::seed_from_u64(seed))
        .unwrap()
}

#[test]
fn test_single_node_reference_tick() {
    let mut topology = Topology::new();
    let cell = topology.add_lstm();
    topology
        .link(
            Port::new(cell, Channel::Peephole),
            [
                Port::new(cell, Channel::InputGate),
                Port::new(cell, Channel::ForgetGate),
                Port::new(cell, Channel::OutputGate),
            ],
        )
        .unwrap();
    let input = topology.add_input(Port::new(cell, Channel::Input)).unwrap();
    let output = topology.add_output(Port::new(cell, Channel::Output)).unwrap();

    topology.write(input, 5.0).unwrap();
    topology.activate().unwrap();

    // Precomputed from the LSTM update with all weights at 1.0.
    let read = |channel| topology.read(Port::new(cell, channel)).unwrap();
    let close = |a: f64, b: f64| (a - b).abs() < 1e-12;
    assert!(close(read(Channel::Input), 1.973_228_596_302_861));
    assert!(close(topology.node(cell).unwrap().memory(), 0.764_538_507_209_539_4));
    assert!(close(read(Channel::Peephole), 0.682_338_280_779_355_9));
    assert!(close(read(Channel::OutputGate), 0.664_260_377_475_510_8));
    assert!(close(read(Channel::Output), 0.453_250_283_956_486));
    assert!(close(topology.read_terminal(output).unwrap(), 0.611_411_739_602_118_3));
}

#[test]
fn test_connect_rejections_leave_graph_unchanged() {
    let mut foreign = Topology::new();
    for _ in 0..8 {
        foreign.add_lstm();
    }
    let stranger = foreign.add_lstm();

    let mut topology = Topology::new();
    let cell = topology.add_lstm();
    let input = topology.add_input(Port::new(cell, Channel::Input)).unwrap();
    let output = topology.add_output(Port::new(cell, Channel::Output)).unwrap();

    let cases: Vec<(Option<Endpoint>, Option<Endpoint>)> = vec![
        (None, None),
        (
            Some(Port::new(cell, Channel::Output).into()),
            Some(Port::new(cell, Channel::Terminal).into()),
        ),
        (
            Some(Port::new(cell, Channel::InputGate).into()),
            Some(Port::new(cell, Channel::Input).into()),
        ),
        (
            Some(Port::new(cell, Channel::Output).into()),
            Some(Endpoint::Many(Vec::new())),
        ),
        (None, Some(Port::new(stranger, Channel::Input).into())),
        (
            Some(Port::terminal(output).into()),
            Some(Port::new(cell, Channel::Input).into()),
        ),
        (
            Some(Port::new(cell, Channel::Output).into()),
            Some(Port::terminal(input).into()),
        ),
        // One bad port in a list rejects the whole list.
        (
            Some(Port::new(cell, Channel::Peephole).into()),
            Some(
                vec![
                    Port::new(cell, Channel::InputGate),
                    Port::new(cell, Channel::Peephole),
                ]
                .into(),
            ),
        ),
    ];

    let edges = topology.edges().to_vec();
    let participants = topology.num_participants();
    for (source, sink) in cases {
        let described = format!("{source:?} -> {sink:?}");
        assert!(topology.connect(source, sink).is_err(), "{described} accepted");
        assert_eq!(topology.edges(), edges.as_slice(), "{described} changed edges");
        assert_eq!(topology.num_participants(), participants);
    }
}

#[test]
fn test_connect_error_kinds() {
    let mut topology = Topology::new();
    let cell = topology.add_lstm();
    let output = topology.add_output(Port::new(cell, Channel::Output)).unwrap();

    assert_eq!(topology.connect(None, None), Err(StructuralError::BareTerminalPair));
    assert!(matches!(
        topology.link(Port::new(cell, Channel::Input), Port::new(cell, Channel::Input)),
        Err(StructuralError::RoleMismatch { channel: Channel::Input, .. })
    ));
    assert_eq!(
        topology.link(Port::terminal(output), Port::new(cell, Channel::Input)),
        Err(StructuralError::OutputAsSource)
    );
    assert!(matches!(
        topology.link(Port::new(cell, Channel::Output), Endpoint::Many(vec![])),
        Err(StructuralError::MalformedEndpoint(_))
    ));
    assert_eq!(
        "forget".parse::<Channel>(),
        Err(StructuralError::UnknownChannelName("forget".into()))
    );
}

#[test]
fn test_epoch_invariants_on_hi_grid() {
    let mut trainer = hi_trainer(7, small_config());
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut previous = trainer.fitness();

    for _ in 0..10 {
        let report = trainer.training_epoch(&mut rng).unwrap();
        let store = trainer.solutions();
        assert!(store.is_sorted(), "store out of order");
        assert!(store.len() <= 50);
        assert!(trainer
            .affect()
            .scores()
            .iter()
            .all(|a| (0.0..=1.0).contains(a)));
        assert!(report.fitness >= previous);
        previous = report.fitness;
    }

    // The stored best replays to the same score and a two-character string.
    let best = trainer.solutions().best().unwrap().clone();
    let mut evaluator = trainer.evaluator().clone();
    let mut topology = trainer.topology().clone();
    topology.load_snapshot(&best.snapshot());
    assert_eq!(evaluator.evaluate(&mut topology, None), Ok(best.fitness));
    topology.load_snapshot(&best.snapshot());
    assert_eq!(evaluator.replay(&mut topology).unwrap().chars().count(), 2);
}

#[test]
fn test_training_is_reproducible() {
    let run = |seed| {
        let mut trainer = hi_trainer(seed, small_config());
        let mut rng = ChaCha8Rng::seed_from_u64(seed + 1);
        for _ in 0..3 {
            trainer.training_epoch(&mut rng).unwrap();
        }
        trainer.solutions().clone()
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn test_change_evaluator_curriculum() {
    let mut trainer = hi_trainer(3, small_config());
    let full = trainer.evaluator().clone();
    trainer.change_evaluator(full.prefix(1)).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..5 {
        trainer.training_epoch(&mut rng).unwrap();
    }
    let before = trainer.topology().save_snapshot();

    let previous = trainer.change_evaluator(full).unwrap();
    assert_eq!(previous.target(), b"H");

    let store = trainer.solutions();
    assert!(store.is_sorted());
    let first = store.best().unwrap().fitness;
    let last = store.as_slice().last().unwrap().fitness;
    assert_eq!(trainer.fitness_bounds(), (last, first));
    assert_eq!(trainer.fitness(), first);
    assert_eq!(trainer.topology().save_snapshot(), before);
}

/// Fails once a fixed number of mutants have been scored.
struct AbortAfter {
    inner: SequenceEvaluator,
    mutants_left: usize,
}

impl Evaluator for AbortAfter {
    fn evaluate(
        &mut self,
        topology: &mut Topology,
        context: Option<&MutationContext<'_>>,
    ) -> Result<f64, EvaluationError> {
        if let Some(context) = context {
            assert_eq!(context.prior_weights.len(), context.current_weights.len());
            if self.mutants_left == 0 {
                return Err(EvaluationError::aborted("user interrupt"));
            }
            self.mutants_left -= 1;
        }
        self.inner.evaluate(topology, context)
    }
}

#[test]
fn test_abort_unwinds_epoch() {
    let grid = Topology::lstm_grid(2).unwrap();
    let inner = SequenceEvaluator::for_grid(&grid, "Hi");
    let mut trainer = TrainerBuilder::new()
        .topology(grid.topology)
        .evaluator(AbortAfter {
            inner,
            mutants_left: 150,
        })
        .config(small_config())
        .build(&mut ChaCha8Rng::seed_from_u64(1))
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    trainer.training_epoch(&mut rng).unwrap();
    let snapshot = trainer.topology().save_snapshot();
    let store = trainer.solutions().clone();
    let solves = trainer.solves();

    let err = trainer.training_epoch(&mut rng).unwrap_err();
    assert_eq!(err, EvaluationError::aborted("user interrupt"));
    assert_eq!(trainer.topology().save_snapshot(), snapshot);
    assert_eq!(trainer.solutions(), &store);
    assert_eq!(trainer.solves(), solves);
    assert_eq!(trainer.epochs(), 1);
}

#[test]
fn test_every_trial_affect_policy() {
    let config = OopsConfig {
        affect_policy: AffectPolicy::EveryTrial,
        backtracking: false,
        ..small_config()
    };
    let mut trainer = hi_trainer(21, config);
    assert!(trainer.affect().is_fresh());

    trainer
        .training_epoch(&mut ChaCha8Rng::seed_from_u64(22))
        .unwrap();
    assert!(!trainer.affect().is_fresh());
    assert!(trainer
        .affect()
        .scores()
        .iter()
        .all(|a| (0.0..=1.0).contains(a)));

    trainer.reset_affect();
    assert!(trainer.affect().scores().iter().all(|&a| a == 1.0));
}

#[test]
fn test_persisted_store_restores() {
    let mut trainer = hi_trainer(31, small_config());
    let mut rng = ChaCha8Rng::seed_from_u64(32);
    for _ in 0..3 {
        trainer.training_epoch(&mut rng).unwrap();
    }
    let json = serde_json::to_string(trainer.solutions()).expect("Serialization failed");

    let mut resumed = hi_trainer(
        77,
        OopsConfig {
            max_solutions: 10,
            ..small_config()
        },
    );
    let store: SolutionStore = serde_json::from_str(&json).expect("Deserialization failed");
    resumed.restore_solutions(store).unwrap();

    let best = trainer.solutions().best().unwrap();
    assert_eq!(resumed.fitness(), best.fitness);
    assert!(resumed.solutions().len() <= 10);
    assert_eq!(resumed.topology().save_weights(), best.weights);
    assert_eq!(resumed.topology().save_state(), best.state);

    let other = Topology::lstm_grid(3).unwrap();
    let mismatched = TrainerBuilder::new()
        .topology(other.topology.clone())
        .evaluator(SequenceEvaluator::for_grid(&other, "Hi"))
        .build(&mut rng)
        .unwrap()
        .restore_solutions(trainer.solutions().clone());
    assert!(matches!(
        mismatched,
        Err(ConfigurationError::LayoutMismatch {
            expected_weights: 47,
            found_weights: 78,
            ..
        })
    ));
}

#[test]
fn test_hi_convergence() {
    let mut trainer = hi_trainer(2024, OopsConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(2025);

    let mut epochs = 0;
    while !SequenceEvaluator::is_solved(trainer.fitness()) {
        trainer.training_epoch(&mut rng).unwrap();
        epochs += 1;
        assert!(epochs < 20_000, "no solution after {epochs} epochs");
    }

    let best = trainer.solutions().best().unwrap().clone();
    let mut topology = trainer.topology().clone();
    topology.load_snapshot(&best.snapshot());
    assert_eq!(trainer.evaluator().replay(&mut topology).unwrap(), "Hi");
}
