use aabb_sample::{SampleApp, SampleConfig};
use anyhow::Context;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = SampleApp::new(SampleConfig::default()).context("failed to initialize sample")?;
    app.run().context("sample program failed")?;
    Ok(())
}
