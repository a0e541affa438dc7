use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::bridge::extract::{
    confirm_authorized, confirm_connected, confirm_paired, confirm_uninstalled, extract_model,
    extract_pull_counts, extract_push_skipped, parse_device_list, parse_package_list,
};
use crate::app::bridge::session::CommandSession;
use crate::app::bridge::timing::{DefaultTiming, TimingStrategy};
use crate::app::config::{verify_install, BridgeConfig};
use crate::app::error::BridgeError;
use crate::app::fsops::{LocalFs, StdFs};
use crate::app::interact::{NullPrompt, UserPrompt};
use crate::app::models::{AuthStatus, Device, DeviceFolder, PackageKind, TransferReport};
use crate::app::registry::DeviceRegistry;

const MAX_AUTH_ATTEMPTS: u32 = 3;

/// Sequences command sessions against the bridge shell: applies the timing
/// strategy, feeds accumulated significant lines to the extractors and keeps
/// the device registry current. One logical operation is in flight at a
/// time; concurrent triggers serialize on the operation guard, which
/// preserves the one-session-per-subprocess invariant.
///
/// Faults never escape: every operation catches its errors here, logs them,
/// reports them through the prompt collaborator and returns a safe
/// empty/false result.
pub struct Orchestrator {
    config: BridgeConfig,
    registry: Mutex<DeviceRegistry>,
    prompt: Arc<dyn UserPrompt>,
    fs: Arc<dyn LocalFs>,
    timing: Arc<dyn TimingStrategy>,
    op_guard: Mutex<()>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Fails when the bridge install has not been set up; no session may
    /// open against a missing or partial install.
    pub fn new(
        config: BridgeConfig,
        prompt: Arc<dyn UserPrompt>,
        fs: Arc<dyn LocalFs>,
        timing: Arc<dyn TimingStrategy>,
    ) -> Result<Self, BridgeError> {
        verify_install(&config, "startup")?;
        Ok(Self {
            config,
            registry: Mutex::new(DeviceRegistry::new()),
            prompt,
            fs,
            timing,
            op_guard: Mutex::new(()),
        })
    }

    pub fn with_defaults(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::new(
            config,
            Arc::new(NullPrompt),
            Arc::new(StdFs),
            Arc::new(DefaultTiming),
        )
    }

    pub fn devices(&self) -> Vec<Device> {
        self.registry
            .lock()
            .map(|registry| registry.snapshot())
            .unwrap_or_default()
    }

    /// Full inventory scan. Tool failures degrade to an empty inventory plus
    /// a reported error; zero devices is a normal outcome, not a fault.
    pub fn scan(&self) -> Vec<Device> {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.scan_inner(&trace_id) {
            Ok(devices) => devices,
            Err(err) => {
                self.report(&err);
                Vec::new()
            }
        }
    }

    fn scan_inner(&self, trace_id: &str) -> Result<Vec<Device>, BridgeError> {
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;

        let start = format!("{program} start-server");
        session.send(&start)?;
        session.wait_settled(self.timing.settle_delay(&start));

        let baseline = session.significant_count();
        session.send(&format!("{program} devices"))?;
        let batch = session.poll_significant(baseline, self.timing.device_scan_poll());
        session.close();

        let mut devices = parse_device_list(&batch);
        info!(trace_id = %trace_id, count = devices.len(), "device scan parsed inventory");

        for device in devices.iter_mut() {
            if device.auth_status == AuthStatus::Authorized {
                if let Some(model) = self.resolve_model(&device.id, trace_id)? {
                    *device = device.clone().with_model(model);
                }
            }
        }

        let snapshot = {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| BridgeError::system("registry lock poisoned", trace_id))?;
            registry.replace(devices);
            registry.snapshot()
        };
        Ok(snapshot)
    }

    /// Nested single-purpose session; the last significant line of the
    /// property query is the model name.
    fn resolve_model(&self, id: &str, trace_id: &str) -> Result<Option<String>, BridgeError> {
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        let command = format!("{program} -s {id} shell getprop ro.product.model");
        session.send(&command)?;
        session.wait_settled(self.timing.settle_delay(&command));
        let lines = session.significant_since(baseline);
        session.close();
        Ok(extract_model(&lines))
    }

    /// Bounded authorization protocol: up to three rounds of server restart,
    /// device poll, human checkpoint and re-check. The checkpoint fires
    /// exactly once per attempt. Exhaustion is surfaced as a plain failure
    /// and never retried automatically.
    pub fn authorize(&self, id: &str) -> bool {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.authorize_inner(id, &trace_id) {
            Ok(authorized) => authorized,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "authorization failed");
                false
            }
        }
    }

    fn authorize_inner(&self, id: &str, trace_id: &str) -> Result<bool, BridgeError> {
        if id.trim().is_empty() {
            return Err(BridgeError::validation("device id is required", trace_id));
        }
        let program = self.config.bridge_program();

        for attempt in 1..=MAX_AUTH_ATTEMPTS {
            let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;

            let kill = format!("{program} kill-server");
            session.send(&kill)?;
            session.wait_settled(self.timing.settle_delay(&kill));

            let start = format!("{program} start-server");
            session.send(&start)?;
            session.wait_settled(self.timing.settle_delay(&start));

            let baseline = session.significant_count();
            session.send(&format!("{program} devices"))?;
            session.poll_significant(baseline, self.timing.device_scan_poll());

            // Out-of-band checkpoint: the user confirms the authorization
            // dialog on the device before we look again.
            self.prompt.acknowledge(&format!(
                "Confirm the authorization dialog on device {id} (attempt {attempt}/{MAX_AUTH_ATTEMPTS}), then continue."
            ));

            let baseline = session.significant_count();
            session.send(&format!("{program} devices"))?;
            let batch = session.poll_significant(baseline, self.timing.device_scan_poll());
            session.close();

            if confirm_authorized(&batch, id) {
                info!(trace_id = %trace_id, id = %id, attempt, "device authorized");
                return Ok(true);
            }
            warn!(trace_id = %trace_id, id = %id, attempt, "device still unauthorized");
        }

        Err(BridgeError::auth_exhausted(
            format!("Device {id} was not authorized after {MAX_AUTH_ATTEMPTS} attempts"),
            trace_id,
        ))
    }

    /// Wireless connect: single command, fixed delay, confirmation from the
    /// last significant line. Retry is the caller's decision.
    pub fn connect(&self, endpoint: &str) -> bool {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.connect_inner(endpoint, &trace_id) {
            Ok(connected) => connected,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    fn connect_inner(&self, endpoint: &str, trace_id: &str) -> Result<bool, BridgeError> {
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        let command = format!("{program} connect {endpoint}");
        session.send(&command)?;
        session.wait_settled(self.timing.settle_delay(&command));
        let lines = session.significant_since(baseline);
        session.close();
        Ok(confirm_connected(&lines))
    }

    pub fn pair(&self, endpoint: &str, code: &str) -> bool {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.pair_inner(endpoint, code, &trace_id) {
            Ok(paired) => paired,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    fn pair_inner(&self, endpoint: &str, code: &str, trace_id: &str) -> Result<bool, BridgeError> {
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        let command = format!("{program} pair {endpoint} {code}");
        session.send(&command)?;
        session.wait_settled(self.timing.settle_delay(&command));
        let lines = session.significant_since(baseline);
        session.close();
        Ok(confirm_paired(&lines))
    }

    /// Push a local directory to a device folder. The source is counted up
    /// front so the terminal line's skipped count can be turned into an
    /// effective transfer count.
    pub fn push(&self, local_dir: &str, folder: DeviceFolder) -> Option<TransferReport> {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.push_inner(local_dir, folder, &trace_id) {
            Ok(report) => Some(report),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn push_inner(
        &self,
        local_dir: &str,
        folder: DeviceFolder,
        trace_id: &str,
    ) -> Result<TransferReport, BridgeError> {
        if !self.fs.dir_exists(local_dir) {
            return Err(BridgeError::validation(
                format!("Local source directory not found: {local_dir}"),
                trace_id,
            ));
        }
        let total = self.fs.count_files(local_dir);

        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        session.send(&format!("{program} push {local_dir} {}", folder.path()))?;
        let batch = session.poll_significant(baseline, self.timing.transfer_poll());
        session.close();

        let terminal = terminal_line(&batch, trace_id)?;
        let skipped = extract_push_skipped(terminal, trace_id)?;
        let report = TransferReport::from_counts(total, skipped);
        info!(
            trace_id = %trace_id,
            total = report.total,
            skipped = report.skipped,
            transferred = report.transferred,
            "push completed"
        );
        Ok(report)
    }

    /// Pull a device folder into a local destination, creating it first.
    pub fn pull(&self, folder: DeviceFolder, local_dir: &str) -> Option<TransferReport> {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.pull_inner(folder, local_dir, &trace_id) {
            Ok(report) => Some(report),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn pull_inner(
        &self,
        folder: DeviceFolder,
        local_dir: &str,
        trace_id: &str,
    ) -> Result<TransferReport, BridgeError> {
        self.fs.ensure_dir(local_dir, trace_id)?;

        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        session.send(&format!("{program} pull {} {local_dir}", folder.path()))?;
        let batch = session.poll_significant(baseline, self.timing.transfer_poll());
        session.close();

        let terminal = terminal_line(&batch, trace_id)?;
        let (pulled, skipped) = extract_pull_counts(terminal, trace_id)?;
        let report = TransferReport::from_counts(pulled, skipped);
        info!(
            trace_id = %trace_id,
            total = report.total,
            skipped = report.skipped,
            transferred = report.transferred,
            "pull completed"
        );
        Ok(report)
    }

    pub fn list_packages(&self, kind: PackageKind) -> Vec<String> {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.list_packages_inner(kind, &trace_id) {
            Ok(packages) => packages,
            Err(err) => {
                self.report(&err);
                Vec::new()
            }
        }
    }

    fn list_packages_inner(
        &self,
        kind: PackageKind,
        trace_id: &str,
    ) -> Result<Vec<String>, BridgeError> {
        let flag = match kind {
            PackageKind::All => "",
            PackageKind::System => " -s",
            PackageKind::ThirdParty => " -3",
        };
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        session.send(&format!("{program} shell pm list packages{flag}"))?;
        let batch = session.poll_significant(baseline, self.timing.package_poll());
        session.close();
        Ok(parse_package_list(&batch))
    }

    pub fn uninstall(&self, package: &str) -> bool {
        let trace_id = new_trace_id();
        let _guard = self.op_guard.lock();
        match self.uninstall_inner(package, &trace_id) {
            Ok(removed) => removed,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    fn uninstall_inner(&self, package: &str, trace_id: &str) -> Result<bool, BridgeError> {
        if package.trim().is_empty() {
            return Err(BridgeError::validation("package name is required", trace_id));
        }
        let program = self.config.bridge_program();
        let mut session = CommandSession::open(&self.config.bridge_dir, trace_id)?;
        let baseline = session.significant_count();
        let command = format!("{program} uninstall {package}");
        session.send(&command)?;
        session.wait_settled(self.timing.settle_delay(&command));
        let lines = session.significant_since(baseline);
        session.close();
        Ok(confirm_uninstalled(&lines))
    }

    fn report(&self, err: &BridgeError) {
        warn!(trace_id = %err.trace_id, code = %err.code, error = %err.error, "operation failed");
        if self.config.prompt_on_error {
            self.prompt.acknowledge(&err.to_string());
        }
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Transfers end with a single status line; an empty batch means the tool
/// never reported completion and the operation must not guess.
fn terminal_line<'a>(batch: &'a [String], trace_id: &str) -> Result<&'a str, BridgeError> {
    batch
        .last()
        .map(|line| line.as_str())
        .ok_or_else(|| BridgeError::system("Transfer produced no terminal status line", trace_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bridge::timing::PollPolicy;
    use crate::app::interact::RecordingPrompt;
    use std::fs;
    use std::time::Duration;

    struct FastTiming;

    impl TimingStrategy for FastTiming {
        fn settle_delay(&self, _command: &str) -> Duration {
            Duration::from_millis(250)
        }

        fn device_scan_poll(&self) -> PollPolicy {
            PollPolicy {
                interval: Duration::from_millis(25),
                bound: Duration::from_millis(1500),
            }
        }

        fn transfer_poll(&self) -> PollPolicy {
            self.device_scan_poll()
        }

        fn package_poll(&self) -> PollPolicy {
            self.device_scan_poll()
        }
    }

    /// Fake bridge executable: a shell script in a throwaway install dir.
    #[cfg(unix)]
    fn fake_bridge(script: &str) -> (tempfile::TempDir, BridgeConfig) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let tool = dir.path().join("adb");
        fs::write(&tool, script).expect("write fake bridge");
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).expect("chmod");

        let config = BridgeConfig {
            bridge_dir: dir.path().to_string_lossy().to_string(),
            bridge_command: "./adb".to_string(),
            expected_tool_files: 1,
            prompt_on_error: true,
            log_level: "info".to_string(),
        };
        (dir, config)
    }

    #[cfg(unix)]
    fn orchestrator(
        config: BridgeConfig,
        prompt: Arc<dyn UserPrompt>,
    ) -> Orchestrator {
        Orchestrator::new(config, prompt, Arc::new(StdFs), Arc::new(FastTiming))
            .expect("orchestrator")
    }

    const FULL_FAKE: &str = r#"#!/bin/sh
case "$1" in
  devices) printf 'List of devices attached\nABC123\tdevice\n' ;;
  -s) echo 'Pixel 7' ;;
  connect) echo "connected to $2" ;;
  pair) echo "Successfully paired to $2 [guid=39u123]" ;;
  push) echo 'src/: 5 files pushed, 3 skipped. 1.2 MB/s' ;;
  pull) echo '/storage/emulated/0/DCIM/: 12 files pulled, 2 skipped.' ;;
  shell) printf 'package:com.example.app\npackage:com.android.settings\n' ;;
  uninstall) echo 'Success' ;;
esac
exit 0
"#;

    #[test]
    fn rejects_missing_install_dir() {
        let config = BridgeConfig {
            bridge_dir: "/this/path/should/not/exist".to_string(),
            ..BridgeConfig::default()
        };
        let err = Orchestrator::with_defaults(config).expect_err("expected failure");
        assert_eq!(err.code, "ERR_VALIDATION");
    }

    #[cfg(unix)]
    #[test]
    fn scan_builds_inventory_with_resolved_models() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let devices = orchestrator.scan();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "ABC123");
        assert_eq!(devices[0].auth_status, AuthStatus::Authorized);
        assert_eq!(devices[0].model, "Pixel 7");
        assert!(!devices[0].wireless_connected);
        // Registry snapshot matches the returned inventory.
        assert_eq!(orchestrator.devices(), devices);
    }

    #[cfg(unix)]
    #[test]
    fn scan_with_zero_devices_returns_empty_inventory() {
        let script = "#!/bin/sh\nif [ \"$1\" = devices ]; then printf 'List of devices attached\\n'; fi\nexit 0\n";
        let (_dir, config) = fake_bridge(script);
        let prompt = Arc::new(RecordingPrompt::new());
        let orchestrator = orchestrator(config, prompt.clone());

        assert!(orchestrator.scan().is_empty());
        // Nothing found is not an error, so no report fires.
        assert_eq!(prompt.count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn authorize_succeeds_with_one_checkpoint() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let prompt = Arc::new(RecordingPrompt::new());
        let orchestrator = orchestrator(config, prompt.clone());

        assert!(orchestrator.authorize("ABC123"));
        assert_eq!(prompt.count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn authorize_exhausts_after_three_checkpoints() {
        let script = "#!/bin/sh\nif [ \"$1\" = devices ]; then printf 'List of devices attached\\nABC123\\tunauthorized\\n'; fi\nexit 0\n";
        let (_dir, config) = fake_bridge(script);
        let prompt = Arc::new(RecordingPrompt::new());
        let orchestrator = orchestrator(config, prompt.clone());

        assert!(!orchestrator.authorize("ABC123"));
        // Exactly one checkpoint per attempt, no extra report prompt.
        assert_eq!(prompt.count(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn connect_and_pair_confirm_from_output() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        assert!(orchestrator.connect("192.168.1.20:5555"));
        assert!(orchestrator.pair("192.168.1.20:37099", "123456"));
    }

    #[cfg(unix)]
    #[test]
    fn push_reports_effective_transfer_count() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let source = tempfile::tempdir().expect("tempdir");
        for index in 0..5 {
            fs::write(source.path().join(format!("file{index}.txt")), "data").expect("write");
        }

        let report = orchestrator
            .push(&source.path().to_string_lossy(), DeviceFolder::Dcim)
            .expect("report");
        assert_eq!(report.total, 5);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.transferred, 2);
    }

    #[cfg(unix)]
    #[test]
    fn push_rejects_missing_source_dir() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let prompt = Arc::new(RecordingPrompt::new());
        let orchestrator = orchestrator(config, prompt.clone());

        assert!(orchestrator
            .push("/this/path/should/not/exist", DeviceFolder::Dcim)
            .is_none());
        assert_eq!(prompt.count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn pull_creates_destination_and_extracts_counts() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let dest_root = tempfile::tempdir().expect("tempdir");
        let dest = dest_root.path().join("pulled/dcim");
        let report = orchestrator
            .pull(DeviceFolder::Dcim, &dest.to_string_lossy())
            .expect("report");
        assert!(dest.is_dir());
        assert_eq!(report.total, 12);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.transferred, 10);
    }

    #[cfg(unix)]
    #[test]
    fn malformed_transfer_line_is_a_hard_error() {
        let script =
            "#!/bin/sh\nif [ \"$1\" = pull ]; then echo 'transfer went fine'; fi\nexit 0\n";
        let (_dir, config) = fake_bridge(script);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let dest_root = tempfile::tempdir().expect("tempdir");
        let dest = dest_root.path().join("out");
        let err = orchestrator
            .pull_inner(DeviceFolder::Dcim, &dest.to_string_lossy(), "trace")
            .expect_err("expected malformed error");
        assert_eq!(err.code, "ERR_MALFORMED");
    }

    #[cfg(unix)]
    #[test]
    fn silent_transfer_is_a_hard_error_not_zero() {
        let script = "#!/bin/sh\nexit 0\n";
        let (_dir, config) = fake_bridge(script);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let source = tempfile::tempdir().expect("tempdir");
        let err = orchestrator
            .push_inner(&source.path().to_string_lossy(), DeviceFolder::Dcim, "trace")
            .expect_err("expected missing terminal line error");
        assert_eq!(err.code, "ERR_SYSTEM");
    }

    #[cfg(unix)]
    #[test]
    fn lists_packages_and_uninstalls() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let orchestrator = orchestrator(config, Arc::new(NullPrompt));

        let packages = orchestrator.list_packages(PackageKind::All);
        assert_eq!(packages, vec!["com.example.app", "com.android.settings"]);
        assert!(orchestrator.uninstall("com.example.app"));
    }

    #[cfg(unix)]
    #[test]
    fn uninstall_requires_package_name() {
        let (_dir, config) = fake_bridge(FULL_FAKE);
        let prompt = Arc::new(RecordingPrompt::new());
        let orchestrator = orchestrator(config, prompt.clone());

        assert!(!orchestrator.uninstall("  "));
        assert_eq!(prompt.count(), 1);
    }
}
