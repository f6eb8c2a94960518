// src/bin/nlv.rs

//! Driver program _nlv_ drives the [_nlvlib_].
//!
//! Opens a framed packet-log file, activates a protocol, optionally runs
//! one directional search, and optionally exports every packet's parsed
//! text. Progress prints to STDERR; results and exports print to STDOUT.
//! `nlv.rs` should be the main thread and the only thread that prints to
//! STDOUT.
//!
//! [_nlvlib_]: nlvlib

#![allow(non_camel_case_types)]

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use ::anyhow::Context;
use ::clap::{Parser, ValueEnum};
use ::crossbeam_channel::Receiver;

use ::nlvlib::common::{CancelToken, FPath, Percent, ResultFind};
use ::nlvlib::data::item::ViewerItemP;
use ::nlvlib::data::parsed::ParseState;
use ::nlvlib::debug::printers::e_err;
use ::nlvlib::protocols::default::DEFAULT_PROTOCOL_ID;
use ::nlvlib::protocols::ProtocolRegistry;
use ::nlvlib::readers::framedlog::FramedLog;
use ::nlvlib::viewer::matchers::{
    self,
    MatchFn,
    TextMode,
};
use ::nlvlib::viewer::search::{SearchDirection, SearchEvent, SearchRequest};
use ::nlvlib::viewer::{ReadEvent, ReadSummary, Viewer};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// command-line parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What one `--find` pattern means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FindMode {
    /// opcode equality (enumeration name, hex, or decimal)
    Opcode,
    /// wildcard hex byte pattern over raw bytes and binary extractions
    Bytes,
    /// wildcard hex byte pattern over raw packet bytes only
    RawBytes,
    /// substring of the parsed text
    Text,
    /// regular expression over the parsed text
    Regex,
    /// substring of any parsed string extraction
    Strings,
}

const CLI_HELP_AFTER: &str = "\
Search patterns:
  --find-mode opcode     PING, 0x11, 17
  --find-mode bytes      'DE AD ?? EF'  (? matches any byte)
  --find-mode text       case-insensitive unless --match-case

Exit status is 0 when the search matched (or no search ran), 1 otherwise.";

#[derive(Parser, Debug)]
#[command(
    name = "nlv",
    author,
    version,
    about = "Inspect captured network packet logs: parse, search, export.",
    after_help = CLI_HELP_AFTER,
)]
struct CLI_Args {
    /// Path of the packet log to open.
    #[clap(required_unless_present = "list_protocols")]
    path: Option<FPath>,

    /// Protocol to interpret packets with; defaults to the protocol the
    /// log suggests, else the hex-dump default protocol.
    #[clap(short, long)]
    protocol: Option<String>,

    /// List the registered protocols and exit.
    #[clap(long)]
    list_protocols: bool,

    /// Search pattern; meaning chosen by --find-mode.
    #[clap(short, long)]
    find: Option<String>,

    /// How to interpret the --find pattern.
    #[clap(long, value_enum, default_value = "text", requires = "find")]
    find_mode: FindMode,

    /// Find the next packet whose parse fails.
    #[clap(long, conflicts_with = "find")]
    next_error: bool,

    /// Find the next packet no parser recognizes.
    #[clap(long, conflicts_with = "find")]
    next_undefined: bool,

    /// Find the next packet whose opcode is missing from the protocol's
    /// enumeration.
    #[clap(long, conflicts_with = "find")]
    next_unknown_opcode: bool,

    /// Search backward instead of forward.
    #[clap(short, long)]
    backward: bool,

    /// Continue the search from this packet index (exclusive).
    #[clap(long)]
    from: Option<usize>,

    /// Case-sensitive text comparison.
    #[clap(long)]
    match_case: bool,

    /// Interpret \r \n \t \0 escapes in the text pattern.
    #[clap(long)]
    unescape: bool,

    /// Export every packet's parsed text to this file ("-" for STDOUT).
    #[clap(short, long)]
    export: Option<FPath>,

    /// Evict least-recently-used parses automatically while working.
    #[clap(long)]
    auto_evict: bool,

    /// Print counts about the processed log.
    #[clap(short, long)]
    summary: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// signal handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wire SIGINT to cooperative cancellation of every worker: the first
/// `ctrl+c` asks the read, search, and export workers to stop at their
/// next checkpoint.
fn set_signal_handler(
    viewer: Arc<Viewer>,
    cancel: CancelToken,
) -> anyhow::Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("interrupted, cancelling…");
        cancel.cancel();
        viewer.cancel_read();
        viewer.cancel_search();
        viewer.cancel_export();
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// progress printing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn eprint_progress(
    what: &str,
    percent: Percent,
) {
    eprint!("\r{}… {:>3}%", what, percent);
    if percent >= 100 {
        eprintln!();
    }
    let _ = std::io::stderr().flush();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// stages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Open the log and wait for the read worker, printing progress.
fn read_log(
    viewer: &Viewer,
    path: &FPath,
) -> anyhow::Result<ReadSummary> {
    let log = FramedLog::open(path).with_context(|| format!("cannot open {:?}", path))?;
    let events: Receiver<ReadEvent> = viewer.open_log(Box::new(log))?;
    loop {
        match events.recv() {
            Ok(ReadEvent::Progress(percent)) => eprint_progress("reading", percent),
            Ok(ReadEvent::Done(result)) => {
                return result.with_context(|| format!("error reading {:?}", path))
            }
            Err(_disconnected) => anyhow::bail!("read worker exited without a completion"),
        }
    }
}

/// Build the requested matcher against the active protocol.
fn build_matcher(
    viewer: &Viewer,
    args: &CLI_Args,
) -> anyhow::Result<Option<MatchFn>> {
    let ctx = viewer.parse_context()?;
    if args.next_error {
        return Ok(Some(matchers::parser_error(&ctx)));
    }
    if args.next_undefined {
        return Ok(Some(matchers::undefined_parser(&ctx)));
    }
    if args.next_unknown_opcode {
        return Ok(Some(matchers::unknown_opcode(&ctx)?));
    }
    let pattern: &str = match args.find {
        Some(ref pattern) => pattern,
        None => return Ok(None),
    };
    let matcher: MatchFn = match args.find_mode {
        FindMode::Opcode => matchers::opcode_equals(&ctx, pattern)?,
        FindMode::Bytes => matchers::binary_subsequence(&ctx, pattern)?,
        FindMode::RawBytes => matchers::packet_bytes(pattern)?,
        FindMode::Text => {
            matchers::parsed_text(&ctx, pattern, TextMode::Contains, args.match_case, args.unescape)?
        }
        FindMode::Regex => {
            matchers::parsed_text(&ctx, pattern, TextMode::Regex, args.match_case, args.unescape)?
        }
        FindMode::Strings => matchers::string_extractions(
            &ctx,
            pattern,
            TextMode::Contains,
            args.match_case,
            args.unescape,
        )?,
    };

    Ok(Some(matcher))
}

/// Run one search to completion, printing progress, returning the found
/// item.
fn run_search(
    viewer: &Viewer,
    matcher: MatchFn,
    args: &CLI_Args,
) -> anyhow::Result<Option<ViewerItemP>> {
    if let Some(from) = args.from {
        viewer
            .set_selected(from)
            .context("--from index out of range")?;
    }
    let direction = match args.backward {
        true => SearchDirection::Backward,
        false => SearchDirection::Forward,
    };
    let request = SearchRequest::new(direction, args.from.is_some(), matcher);
    let events: Receiver<SearchEvent> = viewer.start_search(request)?;
    loop {
        match events.recv() {
            Ok(SearchEvent::Progress(percent)) => eprint_progress("searching", percent),
            Ok(SearchEvent::Done(ResultFind::Found(itemp))) => return Ok(Some(itemp)),
            Ok(SearchEvent::Done(ResultFind::NotFound)) => return Ok(None),
            Ok(SearchEvent::Done(ResultFind::Cancelled)) => return Ok(None),
            Ok(SearchEvent::Done(ResultFind::Err(err))) => {
                return Err(err).context("search worker failed")
            }
            // cancelled searches hang up without a completion
            Err(_disconnected) => return Ok(None),
        }
    }
}

/// Print one found packet: summary line plus parsed text.
fn print_found(
    viewer: &Viewer,
    itemp: &ViewerItemP,
) -> anyhow::Result<()> {
    let packet = itemp.packet();
    match packet.opcode() {
        Some(opcode) => println!(
            "packet {} | {} | opcode 0x{:X} | {} bytes",
            packet.index(),
            packet.time(),
            opcode,
            packet.len(),
        ),
        None => println!(
            "packet {} | {} | {} bytes",
            packet.index(),
            packet.time(),
            packet.len(),
        ),
    }
    match viewer.parse_item(packet.index())? {
        ParseState::Parsed(outputp) if !outputp.text().is_empty() => {
            println!("{}", outputp.text().trim_end_matches('\n'));
        }
        ParseState::Failed(err) => println!("(parse error: {})", err),
        _ => {}
    }

    Ok(())
}

/// Export parsed text to the passed path, `-` meaning STDOUT.
fn run_export(
    viewer: &Viewer,
    target: &FPath,
    cancel: &CancelToken,
) -> anyhow::Result<bool> {
    let mut progress = |percent: Percent| eprint_progress("exporting", percent);
    let result = match target.as_str() {
        "-" => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            viewer.export_parsed_text(&mut writer, &mut progress, cancel)
        }
        _ => {
            let file = std::fs::File::create(target)
                .with_context(|| format!("cannot create {:?}", target))?;
            let mut writer = std::io::BufWriter::new(file);
            viewer.export_parsed_text(&mut writer, &mut progress, cancel)
        }
    };
    match result {
        ResultFind::Found(count) => {
            eprintln!("exported {} packets", count);
            Ok(true)
        }
        ResultFind::Cancelled => {
            eprintln!("export cancelled");
            Ok(false)
        }
        ResultFind::NotFound => Ok(true),
        ResultFind::Err(err) => Err(err).context("export failed"),
    }
}

fn print_summary(viewer: &Viewer) {
    let protocol: String = viewer
        .current_protocol()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!("packets:        {}", viewer.count());
    println!("protocol:       {}", protocol);
    println!("parses cached:  {}", viewer.eviction_queue().len());
    println!("auto eviction:  {}", viewer.auto_eviction_enabled());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// main
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn run() -> anyhow::Result<ExitCode> {
    let args = CLI_Args::parse();

    let registry = Arc::new(ProtocolRegistry::with_builtins());
    if args.list_protocols {
        for protocolp in registry.list() {
            println!("{:<12} {}", protocolp.id(), protocolp.name());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let path: &FPath = args
        .path
        .as_ref()
        .context("a log path is required")?;
    let viewer = Arc::new(Viewer::new(registry));
    let cancel = CancelToken::new();
    set_signal_handler(viewer.clone(), cancel.clone())?;

    let summary: ReadSummary = read_log(&viewer, path)?;
    if summary.cancelled {
        eprintln!("read cancelled after {} packets", summary.count);
        return Ok(ExitCode::FAILURE);
    }
    eprintln!("read {} packets from {}", summary.count, path);

    // an explicit --protocol wins over the log's suggestion; fall back
    // to the hex-dump protocol so parsing always has an interpreter
    if let Some(ref id) = args.protocol {
        viewer.set_protocol(id)?;
    } else if viewer
        .current_protocol()
        .is_none()
    {
        viewer.set_protocol(DEFAULT_PROTOCOL_ID)?;
    }

    viewer.set_auto_eviction_enabled(args.auto_evict);

    let mut code = ExitCode::SUCCESS;
    if let Some(matcher) = build_matcher(&viewer, &args)? {
        match run_search(&viewer, matcher, &args)? {
            Some(itemp) => {
                viewer.set_selected(itemp.index())?;
                print_found(&viewer, &itemp)?;
            }
            None => {
                eprintln!("not found");
                code = ExitCode::FAILURE;
            }
        }
    }

    if let Some(ref target) = args.export {
        if !run_export(&viewer, target, &cancel)? {
            code = ExitCode::FAILURE;
        }
    }

    if args.summary {
        print_summary(&viewer);
    }

    viewer.close_log();

    Ok(code)
}

pub fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            e_err!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
