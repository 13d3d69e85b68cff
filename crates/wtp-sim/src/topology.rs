use std::ffi::OsString;
use std::process::{Command, Output};

/// A Linux network namespace managed via `ip netns`.
///
/// Creates the namespace on construction, initializes loopback, and
/// deletes the namespace on drop. Supports executing commands inside
/// the namespace and creating veth links to other namespaces.
///
/// Requires root; the harness refuses to start without it.
#[derive(Debug)]
pub struct Namespace {
    pub name: String,
}

impl Namespace {
    pub fn new(name: &str) -> Result<Self, std::io::Error> {
        // cleanup any leftover from an aborted run
        let _ = Command::new("ip").args(["netns", "del", name]).output();

        let output = Command::new("ip").args(["netns", "add", name]).output()?;
        check(&output, "create netns")?;

        let ns = Self {
            name: name.to_string(),
        };
        let output = ns.exec("ip", &["link", "set", "lo", "up"])?;
        check(&output, "bring up loopback")?;

        tracing::debug!(ns = %ns.name, "namespace created");
        Ok(ns)
    }

    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<Output, std::io::Error> {
        Command::new("ip")
            .args(["netns", "exec", &self.name, cmd])
            .args(args)
            .output()
    }

    /// Program and arguments that run `program args...` inside this namespace.
    ///
    /// `ip netns exec` replaces itself with the program, so the spawned PID
    /// is the program's own and signals reach it directly.
    pub fn wrap(
        &self,
        program: impl Into<OsString>,
        args: &[OsString],
    ) -> (OsString, Vec<OsString>) {
        let mut wrapped: Vec<OsString> = ["netns", "exec", self.name.as_str()]
            .into_iter()
            .map(OsString::from)
            .collect();
        wrapped.push(program.into());
        wrapped.extend(args.iter().cloned());
        (OsString::from("ip"), wrapped)
    }

    pub fn add_veth_link(
        &self,
        other: &Namespace,
        veth_name_local: &str,
        veth_name_peer: &str,
        ip_local: &str,
        ip_peer: &str,
    ) -> std::io::Result<()> {
        // Clean up potential leftovers in host
        let _ = Command::new("ip")
            .args(["link", "del", veth_name_local])
            .output();

        // 1. Create veth pair in host
        let output = Command::new("ip")
            .args([
                "link",
                "add",
                veth_name_local,
                "type",
                "veth",
                "peer",
                "name",
                veth_name_peer,
            ])
            .output()?;
        check(&output, "create veth pair")?;

        // 2. Move each end into its namespace
        let output = Command::new("ip")
            .args(["link", "set", veth_name_local, "netns", &self.name])
            .output()?;
        check(&output, "move local veth")?;

        let output = Command::new("ip")
            .args(["link", "set", veth_name_peer, "netns", &other.name])
            .output()?;
        check(&output, "move peer veth")?;

        // 3. Address and raise both ends
        for (ns, iface, ip) in [
            (self, veth_name_local, ip_local),
            (other, veth_name_peer, ip_peer),
        ] {
            let output = ns.exec("ip", &["addr", "add", ip, "dev", iface])?;
            check(&output, "set address")?;
            let output = ns.exec("ip", &["link", "set", iface, "up"])?;
            check(&output, "set link up")?;
        }

        Ok(())
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        // Deleting the namespace also removes the veth ends inside it.
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

pub(crate) fn check(output: &Output, what: &str) -> std::io::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(std::io::Error::other(format!(
        "Failed to {what}: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Whether namespaces can be created here: running as root with a working
/// `ip netns`. Tests that need real namespaces skip themselves otherwise.
#[cfg(test)]
pub(crate) fn netns_available() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } != 0 {
        return false;
    }
    Command::new("ip")
        .args(["netns", "list"])
        .output()
        .is_ok_and(|o| o.status.success())
}

/// A namespace name no other test in this process will use. Fits the
/// 15-byte limit that also applies to interface names.
#[cfg(test)]
pub(crate) fn scratch_ns_name(tag: &str) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);

    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = format!("{tag}{:04x}{n}", std::process::id() & 0xFFFF);
    name.truncate(15);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_prefixes_netns_exec() {
        // Constructing the struct directly avoids touching the system; the
        // Drop impl's `ip netns del` on a nonexistent name is harmless.
        let ns = Namespace {
            name: "wtp_unit".into(),
        };
        let (program, args) = ns.wrap("/bin/wSender", &["10.0.0.2".into(), "2333".into()]);
        let args: Vec<&str> = args.iter().map(|s| s.to_str().unwrap()).collect();
        assert_eq!(program, "ip");
        assert_eq!(
            args,
            ["netns", "exec", "wtp_unit", "/bin/wSender", "10.0.0.2", "2333"]
        );
    }

    #[test]
    fn scratch_names_are_distinct_and_short() {
        let a = scratch_ns_name("wtp_s");
        let b = scratch_ns_name("wtp_s");
        assert_ne!(a, b);
        assert!(a.starts_with("wtp_s"));
        assert!(scratch_ns_name("a_very_long_namespace_tag").len() <= 15);
    }

    #[test]
    fn test_create_namespace_pair() {
        if !netns_available() {
            eprintln!("Skipping test, unsufficient privileges or missing tools");
            return;
        }

        let ns1 = Namespace::new(&scratch_ns_name("wtp_a")).expect("Failed to create ns1");
        let _ns2 = Namespace::new(&scratch_ns_name("wtp_b")).expect("Failed to create ns2");

        let out1 = ns1.exec("ip", &["link"]).expect("Failed to exec ip link");
        let out1_str = String::from_utf8_lossy(&out1.stdout);
        assert!(out1_str.contains("lo"));
    }

    #[test]
    fn test_veth_link() {
        if !netns_available() {
            eprintln!("Skipping test, unsufficient privileges or missing tools");
            return;
        }

        let ns1 = Namespace::new(&scratch_ns_name("wtp_la")).expect("Failed to create ns1");
        let ns2 = Namespace::new(&scratch_ns_name("wtp_lb")).expect("Failed to create ns2");

        // Interface names are limited to 15 chars.
        let suffix = std::process::id() % 100_000;
        let v_a = format!("wtpa_{suffix}");
        let v_b = format!("wtpb_{suffix}");

        ns1.add_veth_link(&ns2, &v_a, &v_b, "10.200.1.1/24", "10.200.1.2/24")
            .expect("Failed to create veth link");

        let out = ns1
            .exec("ping", &["-c", "1", "-W", "1", "10.200.1.2"])
            .expect("Failed to exec ping");
        assert!(
            out.status.success(),
            "Ping failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
}
