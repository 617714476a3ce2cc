use poutine::runtime::Normal;
use poutine::runtime::error::Result;
use poutine::runtime::tensor::Tensor;
use poutine::Runtime;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// z ~ Normal(0, 1); x ~ Normal(z, 0.5); returns x
pub fn chain(rt: &Runtime, (): ()) -> Result<Tensor> {
    let z = rt.sample("z", Normal::new(0.0, 1.0)?)?;
    let loc = z.item().unwrap_or(0.0);
    rt.sample("x", Normal::new(loc, 0.5)?)
}

/// One latent site under a caller-chosen name
#[allow(dead_code)]
pub fn single(rt: &Runtime, name: String) -> Result<Tensor> {
    rt.sample(name, Normal::new(0.0, 1.0)?)
}
