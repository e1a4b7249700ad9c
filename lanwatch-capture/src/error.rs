use thiserror::Error;

/// Fatal problems found before capture begins.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("interface '{name}' not found (available: {})", .available.join(", "))]
    InterfaceNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("no capture device available")]
    NoDefaultDevice,

    #[error("failed to list capture devices: {0}")]
    DeviceList(#[source] pcap::Error),

    #[error("failed to open capture on '{target}': {source}")]
    Open {
        target: String,
        #[source]
        source: pcap::Error,
    },

    #[error("'{target}' has link type {name} ({linktype}); only Ethernet frames can be decoded")]
    UnsupportedLinkType {
        target: String,
        linktype: i32,
        name: String,
    },

    #[error("invalid capture filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: pcap::Error,
    },
}

/// Transient failure inside one capture slice, or a broken capture file.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture read failed: {0}")]
    Read(#[from] pcap::Error),
}
