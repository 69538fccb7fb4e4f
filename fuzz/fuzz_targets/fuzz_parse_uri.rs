#![no_main]

use conduit_lifecycle::config::ConnectionUri;
use conduit_lifecycle::ConnectionConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &str| {
    if let Ok(uri) = ConnectionUri::parse(input) {
        let _ = uri.redacted();
        for host in &uri.hosts {
            let _ = host.to_string();
        }
    }

    // Rejected URIs still produce a log-safe form
    let _ = ConnectionConfig::new(input).redacted_uri();
});
