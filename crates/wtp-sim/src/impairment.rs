use crate::topology::{Namespace, check};
use std::io;

/// Handle of the netem qdisc installed by [`shape_link`]. Impairment
/// descriptors replace its parameters in place.
const NETEM_PARENT: &str = "5:1";
const NETEM_HANDLE: &str = "10:";

/// Base shaping of a host link: an HTB rate limit with a netem child that
/// carries the link's propagation delay.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkShape {
    pub rate_mbit: u32,
    pub delay: String,
}

impl Default for LinkShape {
    fn default() -> Self {
        Self {
            rate_mbit: 40,
            delay: "0.1ms".into(),
        }
    }
}

/// `tc` argument lists that install `shape` on `interface`, in order.
pub fn shaping_commands(interface: &str, shape: &LinkShape) -> Vec<Vec<String>> {
    let rate = format!("{}mbit", shape.rate_mbit);
    let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        args(&[
            "qdisc", "add", "dev", interface, "root", "handle", "5:", "htb", "default", "1",
        ]),
        args(&[
            "class", "add", "dev", interface, "parent", "5:", "classid", NETEM_PARENT, "htb",
            "rate", rate.as_str(),
        ]),
        args(&[
            "qdisc", "add", "dev", interface, "parent", NETEM_PARENT, "handle", NETEM_HANDLE,
            "netem", "delay", shape.delay.as_str(),
        ]),
    ]
}

/// `tc` arguments that swap the link's netem parameters for `descriptor`.
///
/// The descriptor is whatever netem accepts (`"delay 1ms loss 3%"`,
/// `"delay 2ms reorder 20% 20%"`); it is split on whitespace and passed
/// through without interpretation.
pub fn netem_change_args(interface: &str, descriptor: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "qdisc", "change", "dev", interface, "parent", NETEM_PARENT, "handle", NETEM_HANDLE,
        "netem",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(descriptor.split_whitespace().map(str::to_string));
    args
}

/// Installs rate limiting and base delay on an interface inside a namespace.
///
/// Removes any existing root qdisc first.
pub fn shape_link(ns: &Namespace, interface: &str, shape: &LinkShape) -> io::Result<()> {
    let _ = ns.exec("tc", &["qdisc", "del", "dev", interface, "root"]);

    for args in shaping_commands(interface, shape) {
        run_tc(ns, &args)?;
    }
    Ok(())
}

/// Applies a netem descriptor to a link previously set up by [`shape_link`].
pub fn apply_netem(ns: &Namespace, interface: &str, descriptor: &str) -> io::Result<()> {
    let args = netem_change_args(interface, descriptor);
    run_tc(ns, &args)?;
    tracing::debug!(ns = %ns.name, interface, descriptor, "netem applied");
    Ok(())
}

fn run_tc(ns: &Namespace, args: &[String]) -> io::Result<()> {
    let args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = ns.exec("tc", &args)?;
    check(&output, &format!("run tc {}", args.join(" ")))
}
