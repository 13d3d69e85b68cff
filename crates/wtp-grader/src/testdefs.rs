//! Built-in test tables.
//!
//! Base cases exercise a go-back-N style implementation: latency, loss,
//! duplication, reordering, corruption and throughput. Opt cases expect
//! selective acknowledgement, so they forbid duplicate ACKs.

use std::path::Path;

use crate::config::{ConfigError, TestTables};

pub const BUILTIN_TABLES: &str = r#"
# Basic transfer
[[base]]
duration = 2
sender_window = 1
receiver_window = 1
file = "rand16k"
netem = "delay 1ms"

# Latency below the sender's 500ms retransmission timeout
[[base]]
duration = 2
sender_window = 10
receiver_window = 10
file = "rand32k"
netem = "delay 300ms"

# Latency above the timeout: every first transmission is retried
[[base]]
duration = 10
sender_window = 10
receiver_window = 10
file = "rand16k"
netem = "delay 600ms"

[[base]]
duration = 2
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 1ms duplicate 10%"

[[base]]
duration = 10
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 1ms loss 3%"
policies = ["has_dupACK"]

[[base]]
duration = 10
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 0.1ms"
corrupt = 0.03
policies = ["has_dupACK"]

# Throughput
[[base]]
duration = 4
sender_window = 100
receiver_window = 100
file = "rand4M"
netem = "delay 0.1ms"

[[base]]
duration = 3
sender_window = 200
receiver_window = 200
file = "rand4M"
netem = "delay 1ms"

[[base]]
duration = 6
sender_window = 200
receiver_window = 200
file = "rand8M"
netem = "delay 1ms"

# Reordering with a receiver window at least the sender's
[[base]]
duration = 2
sender_window = 5
receiver_window = 10
file = "rand128k"
netem = "delay 2ms reorder 20% 20%"
policies = ["has_dupACK", "no_reTrans"]

[[base]]
duration = 2
sender_window = 10
receiver_window = 10
file = "rand128k"
netem = "delay 1ms reorder 10% 10%"
policies = ["has_dupACK", "no_reTrans"]

[[base]]
duration = 4
sender_window = 20
receiver_window = 10
file = "rand128k"
netem = "delay 1ms"

[[opt]]
duration = 8
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 1ms loss 2%"
policies = ["no_dupACK"]

[[opt]]
duration = 10
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 1ms loss 3%"
policies = ["no_dupACK"]

[[opt]]
duration = 8
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 0.1ms"
corrupt = 0.02
policies = ["no_dupACK"]

[[opt]]
duration = 10
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 0.1ms"
corrupt = 0.03
policies = ["no_dupACK"]

[[opt]]
duration = 2
sender_window = 5
receiver_window = 10
file = "rand128k"
netem = "delay 2ms reorder 20% 20%"
policies = ["no_dupACK", "no_reTrans"]

[[opt]]
duration = 2
sender_window = 5
receiver_window = 5
file = "rand128k"
netem = "delay 2ms reorder 20% 20%"
policies = ["no_dupACK", "no_reTrans"]

[[opt]]
duration = 2
sender_window = 10
receiver_window = 10
file = "rand128k"
netem = "delay 1ms reorder 10% 10%"
policies = ["no_dupACK", "no_reTrans"]

[[opt]]
duration = 2
sender_window = 10
receiver_window = 10
file = "rand512k"
netem = "delay 1ms reorder 10% 10%"
policies = ["no_dupACK", "no_reTrans"]
"#;

pub fn builtin(test_files: &Path) -> Result<TestTables, ConfigError> {
    TestTables::from_toml_str(BUILTIN_TABLES, test_files)
}
