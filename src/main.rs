use anyhow::Result;
use detnav::scan::MaterialScan;
use detnav::settings;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = settings::load_config()?;
    println!("{}", settings);

    let mut scan = MaterialScan::new(settings)?;
    let summary = scan.solve()?;
    scan.writeup(&summary)?;

    Ok(())
}
