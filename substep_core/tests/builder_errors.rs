use rstest::rstest;
use substep_core::error::{BuildError, EncoderError};
use substep_core::mocks::{ScriptedCapture, steady_rotation};
use substep_core::{EstimatorCfg, QuadratureEncoder};
use substep_traits::{CapturePool, ChannelId, Direction, SetupError};

fn source() -> ScriptedCapture {
    ScriptedCapture::new(steady_rotation(7, 3, 1_000, Direction::Forward))
}

#[rstest]
fn builder_missing_source_yields_typed_build_error() {
    let pool = CapturePool::rp2040();
    let err = QuadratureEncoder::<ScriptedCapture>::builder()
        .with_phases(0x0040_4040)
        .try_build(&pool)
        .expect_err("should fail with MissingSource");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingSource) => {}
        other => panic!("expected MissingSource, got: {other:?}"),
    }
    // nothing was leased
    assert_eq!(pool.available(), 8);
}

#[rstest]
fn invalid_estimator_config_is_rejected_before_leasing() {
    let pool = CapturePool::new(1, 1);
    let err = QuadratureEncoder::builder()
        .with_source(source())
        .with_estimator(EstimatorCfg {
            idle_stop_samples: 0,
            idle_stop_us: 0,
        })
        .build(&pool)
        .expect_err("zero idle samples");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
    assert_eq!(pool.available(), 1);
}

#[rstest]
fn exhausted_pool_reports_too_many_instances() {
    let pool = CapturePool::new(1, 2);
    let a = QuadratureEncoder::builder().with_source(source()).build(&pool).unwrap();
    let b = QuadratureEncoder::builder().with_source(source()).build(&pool).unwrap();
    assert_ne!(a.channel(), b.channel());

    let err = QuadratureEncoder::builder()
        .with_source(source())
        .build(&pool)
        .expect_err("pool is full");
    let typed = err.downcast_ref::<EncoderError>();
    assert!(matches!(
        typed,
        Some(EncoderError::Setup(SetupError::TooManyInstances))
    ));
    if let Some(EncoderError::Setup(e)) = typed {
        assert_eq!(e.code(), -2);
    }

    // dropping an encoder returns its channel
    let freed = a.channel();
    drop(a);
    let c = QuadratureEncoder::builder().with_source(source()).build(&pool).unwrap();
    assert_eq!(c.channel(), freed);
}

#[rstest]
fn pool_without_blocks_reports_no_capture_block() {
    let pool = CapturePool::new(0, 4);
    let err = QuadratureEncoder::builder()
        .with_source(source())
        .build(&pool)
        .expect_err("no blocks");
    match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::Setup(e @ SetupError::NoCaptureBlock)) => assert_eq!(e.code(), -1),
        other => panic!("expected NoCaptureBlock, got: {other:?}"),
    }
}

#[rstest]
fn build_takes_first_sample_as_origin() {
    let pool = CapturePool::rp2040();
    let enc = QuadratureEncoder::builder()
        .with_source(source())
        .build(&pool)
        .unwrap();
    assert_eq!(enc.step(), 7);
    assert_eq!(enc.position(), 0.0);
    assert_eq!(enc.speed(), 0.0);
    assert!(enc.is_stopped());
    assert_eq!(enc.channel(), ChannelId { block: 0, channel: 0 });
}
