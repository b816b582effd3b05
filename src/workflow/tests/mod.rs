use super::*;
use crate::auth::{AuthRequest, Authorizer};
use crate::config::UploadPolicy;
use crate::error::{ApiError, AuthError, Error};
use crate::package::{SignRequest, UploadTarget};
use crate::providers::RunContext;
use crate::providers::test_helpers::valid_credential;
use crate::records::{GmailMessage, Record, RecordKind};
use crate::types::Stage;
use crate::validator::AccountValidator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;


/// Scripted provider source
#[derive(Default)]
pub(super) struct FakeSource {
    /// Identities returned by successive `whoami` calls; the last one repeats
    identities: Mutex<VecDeque<String>>,
    records: Vec<Record>,
    fail_collect: bool,
    block_collect: bool,
    collects: AtomicUsize,
    revokes: AtomicUsize,
}

impl FakeSource {
    fn new(identity: &str, records: usize) -> Self {
        Self {
            identities: Mutex::new(VecDeque::from([identity.to_string()])),
            records: messages(records),
            ..Self::default()
        }
    }

    fn then_identity(self, identity: &str) -> Self {
        self.identities
            .lock()
            .unwrap()
            .push_back(identity.to_string());
        self
    }

    fn failing(mut self) -> Self {
        self.fail_collect = true;
        self
    }

    fn blocking(mut self) -> Self {
        self.block_collect = true;
        self
    }

    fn collects(&self) -> usize {
        self.collects.load(Ordering::SeqCst)
    }

    fn revokes(&self) -> usize {
        self.revokes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderSource for FakeSource {
    fn provider(&self) -> Provider {
        Provider::Gmail
    }

    async fn whoami(&self, ctx: &RunContext) -> Result<String> {
        ctx.cancel.check()?;
        let mut identities = self.identities.lock().unwrap();
        let identity = if identities.len() > 1 {
            identities.pop_front().unwrap()
        } else {
            identities.front().cloned().unwrap_or_default()
        };
        Ok(identity)
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>> {
        self.collects.fetch_add(1, Ordering::SeqCst);
        ctx.emit(Event::TotalRecords {
            kind: RecordKind::Message,
            total: self.records.len() as u64,
        });
        ctx.emit(Event::FetchingStarted);

        if self.block_collect {
            ctx.cancel.sleep(Duration::from_secs(3600)).await?;
        }
        if self.fail_collect {
            return Err(ApiError::Status {
                url: "https://gmail.example/batch".to_string(),
                status: 500,
                body: "backend error".to_string(),
            }
            .into());
        }

        ctx.emit(Event::RecordsLoaded {
            kind: RecordKind::Message,
            count: self.records.len() as u64,
        });
        Ok(self.records.clone())
    }

    async fn revoke(&self, _ctx: &RunContext) -> Result<()> {
        self.revokes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn messages(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::Message(GmailMessage {
                id: format!("m{}", i),
                ..Default::default()
            })
        })
        .collect()
}

/// Authorizer handing out a fixed credential, optionally only interactively
#[derive(Default)]
pub(super) struct FakeAuthorizer {
    needs_consent: bool,
    logouts: AtomicUsize,
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn acquire_silent(&self, request: &AuthRequest) -> Result<Credential> {
        if self.needs_consent {
            return Err(AuthError::InteractionRequired("consent_required".into()).into());
        }
        self.acquire_interactive(request).await
    }

    async fn acquire_interactive(&self, request: &AuthRequest) -> Result<Credential> {
        let email = request.login_hint.clone().unwrap_or_default();
        Ok(valid_credential(&email))
    }

    async fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct FakeSigning {
    fail: bool,
    requests: Mutex<Vec<SignRequest>>,
}

#[async_trait]
impl SigningService for FakeSigning {
    async fn sign(&self, request: &SignRequest) -> Result<UploadTarget> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::Other("connection reset".into()));
        }
        Ok(UploadTarget {
            id: "pkg-1".to_string(),
            upload_url: "https://storage.example/pkg-1".to_string(),
        })
    }
}

#[derive(Default)]
pub(super) struct FakeStorage {
    puts: Mutex<Vec<(String, Vec<u8>, String)>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.puts
            .lock()
            .unwrap()
            .push((url.to_string(), bytes, content_type.to_string()));
        Ok(())
    }
}

pub(super) struct FakeNotify {
    ok: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl Default for FakeNotify {
    fn default() -> Self {
        Self {
            ok: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotifyService for FakeNotify {
    async fn notify(&self, package_id: &str, email: &str) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((package_id.to_string(), email.to_string()));
        Ok(self.ok)
    }
}

/// Counts allow-list lookups
pub(super) struct CountingAllowList {
    validator: AccountValidator,
    lookups: AtomicUsize,
}

#[async_trait]
impl AllowListSource for CountingAllowList {
    async fn allowed_emails(&self) -> Result<Vec<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.validator.allowed_emails().await
    }
}

pub(super) struct Harness {
    workflow: Workflow,
    source: Arc<FakeSource>,
    authorizer: Arc<FakeAuthorizer>,
    allow_list: Arc<CountingAllowList>,
    signing: Arc<FakeSigning>,
    storage: Arc<FakeStorage>,
    notify: Arc<FakeNotify>,
}

#[derive(Default)]
pub(super) struct HarnessOptions {
    policy: UploadPolicy,
    needs_consent: bool,
    signing_fails: bool,
    notify_rejects: bool,
}

fn harness(allowed: &[&str], source: FakeSource, options: HarnessOptions) -> Harness {
    let source = Arc::new(source);
    let authorizer = Arc::new(FakeAuthorizer {
        needs_consent: options.needs_consent,
        ..FakeAuthorizer::default()
    });
    let allow_list = Arc::new(CountingAllowList {
        validator: AccountValidator::new(allowed),
        lookups: AtomicUsize::new(0),
    });
    let signing = Arc::new(FakeSigning {
        fail: options.signing_fails,
        ..FakeSigning::default()
    });
    let storage = Arc::new(FakeStorage::default());
    let notify = Arc::new(FakeNotify {
        ok: !options.notify_rejects,
        ..FakeNotify::default()
    });

    let collaborators = Collaborators {
        auth: Arc::new(AuthRegistry::single(
            Arc::clone(&authorizer) as Arc<dyn Authorizer>
        )),
        allow_list: Arc::clone(&allow_list) as Arc<dyn AllowListSource>,
        signing: Arc::clone(&signing) as Arc<dyn SigningService>,
        storage: Arc::clone(&storage) as Arc<dyn ObjectStorage>,
        notify: Arc::clone(&notify) as Arc<dyn NotifyService>,
    };

    let mut config = Config::default();
    config.fetch.chunk_delay = Duration::ZERO;
    config.upload_policy = options.policy;

    let workflow = Workflow::new(Provider::Gmail, config, collaborators)
        .unwrap()
        .with_source(Arc::clone(&source) as Arc<dyn ProviderSource>);

    Harness {
        workflow,
        source,
        authorizer,
        allow_list,
        signing,
        storage,
        notify,
    }
}

/// Drain every event received so far
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn wait_for_stage(workflow: &Workflow, stage: Stage) {
    let mut rx = workflow.watch();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.stage == stage))
        .await
        .expect("timed out waiting for stage")
        .unwrap();
}
