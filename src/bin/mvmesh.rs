mod common;
mod io;

use clap::{App, AppSettings, Arg, ArgMatches};

use std::io::ErrorKind;

use common::*;
use io::*;
use mvmesh::api::frame::*;
use mvmesh::api::*;

struct CLISettings {
    pub input: Box<dyn demuxer::Demuxer>,
    pub flags: McFlags,
    pub level_min: u8,
    pub level_max: u8,
    pub mv_res_min: u8,
    pub lambda: i32,
    pub frames: usize,
    pub verbose: bool,
    pub dump_mvs: bool,
}

pub trait MatchGet {
    fn value_of_int<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, MeshError>>;
}

impl MatchGet for ArgMatches<'_> {
    fn value_of_int<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, MeshError>> {
        self.value_of(name).map(|v| {
            v.parse()
                .map_err(|_| MeshError::InvalidConfig(format!("{} must be an integer, got {}", name, v)))
        })
    }
}

fn parse_cli() -> Result<CLISettings, MeshError> {
    let mut app = App::new("mvmesh")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Motion vector mesh estimator")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("FULLHELP")
                .help("Prints more detailed help information")
                .long("fullhelp"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("y4m file name of input video, - for stdin")
                .short("i")
                .long("input")
                .required_unless("FULLHELP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("LAMBDA")
                .help("Lagrange multiplier for 8 bit luma")
                .long("lambda")
                .takes_value(true)
                .default_value("452"),
        )
        .arg(
            Arg::with_name("LEVEL_MIN")
                .help("coarsest level decimation may stop at (0-4)")
                .long("level-min")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("LEVEL_MAX")
                .help("finest level of the mesh (0-4)")
                .long("level-max")
                .takes_value(true)
                .default_value("3"),
        )
        .arg(
            Arg::with_name("MV_RES_MIN")
                .help("finest vector resolution (0: 1/8, 1: 1/4, 2: 1/2 pel)")
                .long("mv-res-min")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("USE_V")
                .help("allow V edge labels as well as B")
                .long("use-v"),
        )
        .arg(
            Arg::with_name("NO_CHROMA")
                .help("measure distortion on luma only")
                .long("no-chroma"),
        )
        .arg(
            Arg::with_name("FRAMES")
                .help("maximum number of frames to read, 0 for all")
                .short("f")
                .long("frames")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("MVS")
                .help("print the final mesh of every frame")
                .long("mvs"),
        )
        // DEBUGGING
        .arg(
            Arg::with_name("VERBOSE")
                .help("Verbose logging; outputs progress for every frame")
                .long("verbose")
                .short("v"),
        );

    let matches = app.clone().get_matches();

    if matches.is_present("FULLHELP") {
        app.print_long_help().map_err(|e| MeshError::InvalidConfig(e.to_string()))?;
        std::process::exit(0);
    }

    let mut flags = McFlags::USEB;
    flags.set(McFlags::USEV, matches.is_present("USE_V"));
    flags.set(McFlags::USE_CHROMA, !matches.is_present("NO_CHROMA"));

    let input = match matches.value_of("INPUT") {
        Some(input) => demuxer::new(input)?,
        None => return Err(MeshError::InvalidConfig("no input".to_owned())),
    };

    Ok(CLISettings {
        input,
        flags,
        level_min: matches.value_of_int("LEVEL_MIN").unwrap_or(Ok(0))?,
        level_max: matches.value_of_int("LEVEL_MAX").unwrap_or(Ok(3))?,
        mv_res_min: matches.value_of_int("MV_RES_MIN").unwrap_or(Ok(0))?,
        lambda: matches.value_of_int("LAMBDA").unwrap_or(Ok(DEFAULT_LAMBDA))?,
        frames: matches.value_of_int("FRAMES").unwrap_or(Ok(0))?,
        verbose: matches.is_present("VERBOSE"),
        dump_mvs: matches.is_present("MVS"),
    })
}

fn config_for(cli: &CLISettings, frame: &Frame<u16>) -> EstimatorConfig {
    let mut cfg = EstimatorConfig::new(frame.width(), frame.height(), frame.chroma_sampling);
    cfg.flags = cli.flags;
    cfg.level_min = cli.level_min;
    cfg.level_max = cli.level_max;
    cfg.mv_res_min = cli.mv_res_min;
    cfg.lambda = cli.lambda;
    cfg
}

fn dump_mesh(number: usize, grid: &MvGrid) {
    println!("mesh {} 1/{} pel", number, 8 >> grid.mv_res);
    for (vx, vy, pt) in grid.iter().filter(|(_, _, pt)| pt.valid) {
        println!(
            "{} {} {} {} {}{}",
            vx,
            vy,
            pt.mv[0],
            pt.mv[1],
            if pt.right { 'V' } else { 'B' },
            if pt.down { 'V' } else { 'B' }
        );
    }
}

fn main() -> Result<(), MeshError> {
    let mut cli = parse_cli()?;
    let total = if cli.frames > 0 { Some(cli.frames) } else { None };
    let mut progress = ProgressInfo::new(total);
    let mut estimator: Option<Estimator> = None;
    let mut reference: Option<Frame<u16>> = None;
    let mut number = 0;

    loop {
        if cli.frames > 0 && number >= cli.frames {
            break;
        }
        let frame = match cli.input.read() {
            Ok(frame) => frame,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };

        if let Some(reference) = reference.as_ref() {
            if estimator.is_none() {
                estimator = Some(Estimator::new(&config_for(&cli, &frame))?);
            }
            if let Some(est) = estimator.as_mut() {
                let summary = FrameSummary {
                    number,
                    width: frame.width(),
                    height: frame.height(),
                    est: est.estimate(&frame, reference, RefKind::Previous)?,
                };
                println!("{}", summary);
                if cli.dump_mvs {
                    dump_mesh(number, est.mesh());
                }
                progress.add_frame(summary);
                if cli.verbose {
                    eprintln!("{}", progress);
                }
            }
        }

        reference = Some(frame.upsample());
        number += 1;
    }

    if cli.verbose {
        eprintln!("{}", progress.print_summary());
    }
    Ok(())
}
