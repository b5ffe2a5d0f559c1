use clap::{Arg, ArgAction, Command};
use icu_locale::Locale;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::time::Duration;
use translation_mock::mock::{
    MockBackend, MockSettings, MockedExchangeFacade, SubmissionRequest, SubmissionState,
    TaskModel, TranslationFacade, scenarios,
};

const SAMPLE_XLIFF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xliff version="1.2" xmlns="urn:oasis:names:tc:xliff:document:1.2" xmlns:cmxliff="http://www.coremedia.com/2013/xliff-extensions-1.0">
  <file original="article" source-language="en" datatype="xml" cmxliff:target="coremedia:///cap/content/42">
    <body>
      <trans-unit id="title">
        <source>Summer Sale</source>
        <target>Summer Sale</target>
      </trans-unit>
      <trans-unit id="teaser">
        <source>Save up to 50% on <g id="1">all</g> items!</source>
        <target>Save up to 50% on <g id="1">all</g> items!</target>
      </trans-unit>
    </body>
  </file>
</xliff>
"#;

fn is_final(state: SubmissionState) -> bool {
    matches!(
        state,
        SubmissionState::Completed
            | SubmissionState::Redelivered
            | SubmissionState::Cancelled
            | SubmissionState::CancellationConfirmed
    )
}

fn parse_locale(tag: &str) -> Result<Locale, Box<dyn std::error::Error>> {
    tag.parse::<Locale>()
        .map_err(|e| format!("Invalid locale '{}': {:?}", tag, e).into())
}

/// Mock configuration from the config file, overridden by flags
fn mock_config(matches: &clap::ArgMatches) -> Result<Value, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let root: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            match root.get("mock") {
                Some(Value::Object(mock)) => mock.clone(),
                _ => root.as_object().cloned().unwrap_or_default(),
            }
        }
        None => Map::new(),
    };
    if let Some(delay) = matches.get_one::<u64>("delay") {
        config.insert("stateChangeDelaySeconds".to_string(), json!(delay));
    }
    if let Some(jitter) = matches.get_one::<i64>("jitter") {
        config.insert("stateChangeDelayOffsetPercentage".to_string(), json!(jitter));
    }
    if let Some(scenario) = matches.get_one::<String>("scenario") {
        config.insert("scenario".to_string(), json!(scenario));
    }
    if let Some(error) = matches.get_one::<String>("error") {
        config.insert("error".to_string(), json!(error));
    }
    Ok(Value::Object(config))
}

async fn poll_until_final(
    facade: &MockedExchangeFacade,
    submission_id: u64,
    poll_interval: Duration,
) -> Result<SubmissionState, Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(poll_interval);
    let mut last = None;
    loop {
        interval.tick().await;
        let submission = facade.get_submission(submission_id).await?;
        if last != Some(submission.state) {
            println!(
                "📡 Submission {}: {}{}",
                submission_id,
                submission.state,
                if submission.error { " (error)" } else { "" }
            );
            last = Some(submission.state);
        }
        if is_final(submission.state) {
            return Ok(submission.state);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .init();

    let matches = Command::new("translation-mock")
        .version("0.1.0")
        .about("Walks a submission through the mocked translation backend")
        .arg(
            Arg::new("delay")
                .long("delay")
                .short('d')
                .help("Seconds between state changes (default: 2)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("jitter")
                .long("jitter")
                .short('j')
                .help("Random offset of each delay in percent, 0 to 100 (default: 20)")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .help(format!("Scenario to run, one of: {}", scenarios::SCENARIO_IDS.join(", "))),
        )
        .arg(
            Arg::new("error")
                .long("error")
                .help("Error to force (e.g., upload_communication, download_xliff)"),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .help("Submission subject, e.g. \"states: other, completed\""),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .short('l')
                .help("Target locale, may be repeated (default: de)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .help("XLIFF file to translate (default: built-in sample)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON file with mock settings"),
        )
        .arg(
            Arg::new("poll-ms")
                .long("poll-ms")
                .help("Polling interval in milliseconds")
                .default_value("500")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .help("Give up polling after this many seconds")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let mut config = mock_config(&matches)?;
    if let Some(map) = config.as_object_mut() {
        map.entry("stateChangeDelaySeconds").or_insert(json!(2));
        map.entry("stateChangeDelayOffsetPercentage").or_insert(json!(20));
    }
    let settings = MockSettings::from_mock_config(&config)?;
    let poll_interval = Duration::from_millis(*matches.get_one::<u64>("poll-ms").unwrap_or(&500));
    let timeout = Duration::from_secs(*matches.get_one::<u64>("timeout-secs").unwrap_or(&60));

    let target_locales = match matches.get_many::<String>("locale") {
        Some(tags) => tags.map(|t| parse_locale(t)).collect::<Result<Vec<_>, _>>()?,
        None => vec![parse_locale("de")?],
    };
    let source_locale = parse_locale("en")?;
    let (file_name, content) = match matches.get_one::<String>("file") {
        Some(path) => (path.clone(), std::fs::read(path)?),
        None => ("sample.xlf".to_string(), SAMPLE_XLIFF.as_bytes().to_vec()),
    };

    let backend = MockBackend::new();
    let facade = backend.facade(settings);
    println!(
        "🧪 {} (scenario: {}, delay: {}s ±{}%)",
        facade.provider_name(),
        facade.settings().scenario().id(),
        facade.settings().state_change_delay_seconds(),
        facade.settings().state_change_delay_offset_percentage()
    );

    // 1. Upload and submit
    let handle = facade
        .upload_content(&file_name, &content, &source_locale)
        .await?;
    let mut request = SubmissionRequest::new(source_locale).with_content(handle, target_locales);
    if let Some(subject) = matches.get_one::<String>("subject") {
        request = request.with_subject(subject.as_str());
    }
    let submission_id = facade.submit_submission(&request).await?;
    println!("📦 Submitted {} as submission {}", file_name, submission_id);

    // 2. Poll
    let state = match tokio::time::timeout(
        timeout,
        poll_until_final(&facade, submission_id, poll_interval),
    )
    .await
    {
        Ok(state) => state?,
        Err(_) => {
            eprintln!("⏱️  Gave up after {}s", timeout.as_secs());
            return Err("Timeout while polling".into());
        }
    };

    // 3. Download and confirm
    match state {
        SubmissionState::Completed | SubmissionState::Redelivered => {
            facade
                .download_completed_tasks(submission_id, &mut |content: &str, task: &TaskModel| {
                    println!("🌍 Task {} ({}):", task.task_id, task.locale);
                    println!("{}", content);
                    true
                })
                .await?;
            let mut locales = HashSet::new();
            facade
                .confirm_completed_tasks(submission_id, &mut locales)
                .await?;
            if !locales.is_empty() {
                let locales: Vec<String> = locales.iter().map(|l| l.to_string()).collect();
                println!("✅ Confirmed without download: {}", locales.join(", "));
            }
        }
        _ => {
            facade.confirm_cancelled_tasks(submission_id).await?;
            println!("🛑 Confirmed cancellation");
        }
    }

    let submission = facade.get_submission(submission_id).await?;
    println!("🏁 Final state: {}", serde_json::to_string(&submission)?);

    Ok(())
}
