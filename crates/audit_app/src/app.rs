use std::sync::Arc;

use anyhow::{bail, Context, Result};
use audit_core::EnrichmentPolicy;
use audit_engine::{
    client_key, ensure_state_dir, AuditConfig, AuditHook, AuditService, FileStore, HookDeps,
    LocationPreset, RunTestRequest, SessionRecords,
};
use audit_logging::audit_info;

use crate::cli::{Cli, Commands, WatchArgs};
use crate::{persistence, render};

const SERVER_STORE: &str = "sessions.ron";
const LOCAL_STORE: &str = "local.ron";
const LOCAL_CLIENT: &str = "127.0.0.1";

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = AuditConfig::from_env().context("reading configuration")?;
    ensure_state_dir(&cli.state_dir)
        .with_context(|| format!("preparing state directory {:?}", cli.state_dir))?;

    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| persistence::load_or_create_session(&cli.state_dir));
    let service = Arc::new(AuditService::new(
        &config,
        Arc::new(FileStore::new(&cli.state_dir, SERVER_STORE)),
    )?);
    let records = Arc::new(SessionRecords::new(
        session_id,
        service.clone(),
        Arc::new(FileStore::new(&cli.state_dir, LOCAL_STORE)),
    ));

    match cli.command {
        Commands::Run(args) => {
            let location = if args.mobile {
                LocationPreset::Mobile4g
            } else {
                LocationPreset::DesktopCable
            };
            let submitted = service
                .run_test(
                    &client_key(None, Some(LOCAL_CLIENT)),
                    RunTestRequest {
                        url: args.url.clone(),
                        location: Some(location),
                    },
                )
                .await;
            let submission = match submitted {
                Ok(submission) => submission,
                Err(err) if err.is_rate_limited() => {
                    bail!("too many submissions, wait a minute before testing {} again", args.url)
                }
                Err(err) => return Err(err).with_context(|| format!("submitting {}", args.url)),
            };
            println!("Submitted {} ({})", submission.test_id, location.label());
            records
                .set_ai_preference(&submission.test_id, args.watch.ai)
                .await;
            watch(service, records, &submission.test_id, &args.watch).await
        }
        Commands::Open(args) => {
            if args.watch.ai {
                records.set_ai_preference(&args.test_id, true).await;
            }
            watch(service, records, &args.test_id, &args.watch).await
        }
        Commands::Recent => {
            let recent = records.recent_tests().await;
            if recent.is_empty() {
                println!("No recent tests for session {}", records.session_id());
            }
            for entry in &recent {
                println!("{}", render::recent_line(entry));
            }
            Ok(())
        }
    }
}

async fn watch(
    service: Arc<AuditService>,
    records: Arc<SessionRecords>,
    test_id: &str,
    args: &WatchArgs,
) -> Result<()> {
    let policy: EnrichmentPolicy = args.policy.into();
    audit_info!("Following test {} policy={:?}", test_id, policy);
    let deps = HookDeps {
        status: service.clone(),
        insights: service.clone(),
        a11y: service,
        records,
    };
    let mut hook = AuditHook::new(deps, policy);
    let mut views = hook.subscribe();
    hook.open(Some(test_id));

    let mut last_line = String::new();
    while hook.process_next().await {
        if !views.has_changed().unwrap_or(false) {
            continue;
        }
        let line = render::progress_line(&views.borrow_and_update());
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
    }

    let view = hook.view();
    hook.close();
    print!("{}", render::report(&view));
    if let Some(error) = view.error {
        bail!("test {test_id} did not complete: {error}");
    }
    Ok(())
}
