//! Socket frame types.
//!
//! Every frame is a JSON text message. The client sends a [`ClientMessage`]
//! and the server answers with any number of [`ServerMessage`]s carrying the
//! same `service` and `context` back. The server never interprets either
//! field; `context` exists only so the client can find the tab a response
//! belongs to.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Service a frame belongs to.
///
/// Only [`Service::Download`] is produced by this client. Any service name
/// the client does not know decodes as [`Service::Unknown`] and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    Download,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => f.write_str("Download"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub service: Service,
    pub context: String,
    pub request: ClientRequest,
}

/// Everything a client can ask the server for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientRequest {
    ChronoboxCsv {
        run_number: u32,
    },
    ChronoboxPlot {
        run_number: u32,
        args: ChronoboxArgs,
    },
    InitialOdb {
        run_number: u32,
    },
    SequencerEvents {
        run_number: u32,
    },
    TrgScalersCsv {
        run_number: u32,
    },
    TrgScalersPlot {
        run_number: u32,
        args: TrgScalersArgs,
    },
    VerticesCsv {
        run_number: u32,
    },
    VerticesPlot {
        run_number: u32,
        args: VerticesArgs,
    },
}

impl ClientRequest {
    pub fn run_number(&self) -> u32 {
        match self {
            Self::ChronoboxCsv { run_number }
            | Self::ChronoboxPlot { run_number, .. }
            | Self::InitialOdb { run_number }
            | Self::SequencerEvents { run_number }
            | Self::TrgScalersCsv { run_number }
            | Self::TrgScalersPlot { run_number, .. }
            | Self::VerticesCsv { run_number }
            | Self::VerticesPlot { run_number, .. } => *run_number,
        }
    }

    /// Short human-readable label, used as a tab title.
    pub fn label(&self) -> String {
        let what = match self {
            Self::ChronoboxCsv { .. } => "chronobox csv",
            Self::ChronoboxPlot { .. } => "chronobox plot",
            Self::InitialOdb { .. } => "initial odb",
            Self::SequencerEvents { .. } => "sequencer events",
            Self::TrgScalersCsv { .. } => "trg scalers csv",
            Self::TrgScalersPlot { .. } => "trg scalers plot",
            Self::VerticesCsv { .. } => "vertices csv",
            Self::VerticesPlot { .. } => "vertices plot",
        };
        format!("R{} {what}", self.run_number())
    }

    /// File name the server gives this job's output.
    ///
    /// Used when a download response does not name the file itself.
    pub fn default_filename(&self) -> String {
        let run = self.run_number();
        match self {
            Self::ChronoboxCsv { .. } => format!("R{run}_chronobox_timestamps.csv"),
            Self::ChronoboxPlot { .. } => format!("R{run}_chronobox_plot.pdf"),
            Self::InitialOdb { .. } => format!("R{run}_initial_odb.json"),
            Self::SequencerEvents { .. } => format!("R{run}_sequencer_events.csv"),
            Self::TrgScalersCsv { .. } => format!("R{run}_trg_scalers.csv"),
            Self::TrgScalersPlot { .. } => format!("R{run}_trg_scalers_plot.pdf"),
            Self::VerticesCsv { .. } => format!("R{run}_vertices.csv"),
            Self::VerticesPlot { .. } => format!("R{run}_vertices_plot.pdf"),
        }
    }
}

/// Histogram options for a single chronobox channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronoboxArgs {
    pub board_name: String,
    pub channel_number: u8,
    pub t_bins: Option<u32>,
    pub t_max: Option<f64>,
    pub t_min: Option<f64>,
}

/// Options for the trigger scalers plot.
///
/// `remove_input` and `remove_output` are negative on purpose: the server
/// plots the input and output counters unless told otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrgScalersArgs {
    pub t_bins: Option<u32>,
    pub t_max: Option<f64>,
    pub t_min: Option<f64>,
    pub include_drift_veto: bool,
    pub include_pulser: bool,
    pub include_scaledown: bool,
    pub remove_input: bool,
    pub remove_output: bool,
}

/// Histogram options for reconstructed vertices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerticesArgs {
    pub phi_bins: Option<u32>,
    pub phi_max: Option<f64>,
    pub phi_min: Option<f64>,
    pub r_bins: Option<u32>,
    pub r_max: Option<f64>,
    pub r_min: Option<f64>,
    pub t_bins: Option<u32>,
    pub t_max: Option<f64>,
    pub t_min: Option<f64>,
    pub z_bins: Option<u32>,
    pub z_max: Option<f64>,
    pub z_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub service: Service,
    pub context: String,
    pub response: ServerResponse,
}

impl ServerMessage {
    pub fn new(service: Service, context: impl Into<String>, response: ServerResponse) -> Self {
        Self {
            service,
            context: context.into(),
            response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerResponse {
    /// One line of progress output.
    Text(String),
    /// One line describing a failure. No further frames are expected.
    Error(String),
    /// Signed token for a one-time download of the job's output.
    #[serde(rename = "DownloadJWT")]
    DownloadJwt(String),
}

impl ServerResponse {
    /// The line or token carried by the frame.
    pub fn payload(&self) -> &str {
        match self {
            Self::Text(s) | Self::Error(s) | Self::DownloadJwt(s) => s,
        }
    }
}

/// Build the frame for `request`, tagged with `context`.
pub fn encode_request(context: &str, request: &ClientRequest) -> Result<String, ProtocolError> {
    let msg = ClientMessage {
        service: Service::Download,
        context: context.to_string(),
        request: request.clone(),
    };
    encode_client_message(&msg)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

pub fn decode_server_message(raw: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Decode)
}
