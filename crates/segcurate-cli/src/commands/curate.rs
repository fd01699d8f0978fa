//! Curate command - walk an image set headlessly and save the selection.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use segcurate::curation::{CurationImageType, FileBytesReader};
use segcurate::{
    CurationConfig, CurationService, CurationSession, CurationView, ExperimentsModel, LoaderPool,
    UserSettings,
};
use tracing::info;

pub struct CurateArgs {
    pub raw: PathBuf,
    pub seg1: PathBuf,
    pub seg2: Option<PathBuf>,
    pub exclude: Vec<usize>,
    pub settings: Option<PathBuf>,
    pub experiment: String,
    pub splits: bool,
}

pub fn run(args: CurateArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = UserSettings::from_env_or_file(args.settings.as_deref())?;
    let experiments = Arc::new(ExperimentsModel::new(settings)?);
    experiments.set_experiment_name(Some(args.experiment.clone()))?;

    let config = CurationConfig::default();
    let workers = config.loader_workers;
    info!(experiment = %args.experiment, workers, "starting curation");
    let mut session = CurationSession::with_config(experiments, config);
    let service = CurationService::default();

    let mut inputs = vec![
        (CurationImageType::Raw, &args.raw),
        (CurationImageType::Seg1, &args.seg1),
    ];
    if let Some(seg2) = &args.seg2 {
        inputs.push((CurationImageType::Seg2, seg2));
    }
    for (image_type, dir) in inputs {
        let files = service.select_directory(&mut session, image_type, dir)?;
        println!(
            "{} {} ({} files)",
            format!("{:>5}", image_type.as_str()).cyan().bold(),
            dir.display(),
            files.len()
        );
    }

    session.set_current_view(CurationView::MainView)?;
    let total = session.num_images();
    if let Some(&bad) = args.exclude.iter().find(|&&i| i >= total) {
        return Err(format!("Excluded index {} is out of range (0..{})", bad, total).into());
    }

    let mut loader = LoaderPool::new(Arc::new(FileBytesReader), workers)?;
    session.start_loading_images()?;
    loop {
        loader.request_pending(&session)?;
        loader.pump(&mut session)?;

        let index = session
            .curr_image_index()
            .ok_or("Session has no current image")?;
        let keep = !args.exclude.contains(&index);
        session.set_use_image(keep)?;

        if verbose {
            let record = session.current_record()?;
            let mark = if keep { "keep".green() } else { "skip".red() };
            println!("  [{}] {} {}", index, mark, record.raw_file.display());
        }

        if !session.has_next_image() {
            break;
        }
        session.next_image()?;
    }

    let rows = session
        .curation_record()
        .map_or(0, |records| records.iter().filter(|r| r.to_use).count());
    let written = if args.splits {
        service.save_splits(&mut session)?
    } else {
        service.save(&mut session)?;
        vec![session.csv_path()?]
    };

    println!();
    println!(
        "{} {} of {} images",
        "Saved".green().bold(),
        rows.to_string().white().bold(),
        total
    );
    for path in &written {
        println!("  {}", path.display());
    }

    Ok(())
}
