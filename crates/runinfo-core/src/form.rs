//! Job forms and the validity rules that gate submission.
//!
//! A form is valid exactly when [`JobForm::errors`] is empty; the submit
//! control mirrors that state. Building a request from an invalid form is
//! refused with every error at once.

use std::fmt;

use thiserror::Error;

use crate::protocol::{ChronoboxArgs, ClientRequest, TrgScalersArgs, VerticesArgs};

/// Shown before the individual errors when a submit is refused.
pub const FIX_FORM_ERRORS: &str = "Please fix all form errors before submitting.";

/// A histogram axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Phi,
    R,
    Time,
    Z,
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phi => "phi",
            Self::R => "r",
            Self::Time => "t",
            Self::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("select a chronobox channel")]
    MissingChannel,

    #[error("{axis} bins must be at least 1")]
    ZeroBins { axis: Axis },

    #[error("{axis} {bound} must be a finite number")]
    NonFinite { axis: Axis, bound: &'static str },

    #[error("{axis} max ({max}) must not be less than {axis} min ({min})")]
    InvertedRange { axis: Axis, min: f64, max: f64 },

    #[error("select at least one trigger counter")]
    NoCounterSelected,
}

/// Every error found in a form, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct FormErrors(pub Vec<FormError>);

impl FormErrors {
    pub fn errors(&self) -> &[FormError] {
        &self.0
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(FIX_FORM_ERRORS)?;
        for err in &self.0 {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// Bin count and optional bounds for one axis. Empty inputs are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisRange {
    pub bins: Option<u32>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AxisRange {
    pub fn new(bins: Option<u32>, min: Option<f64>, max: Option<f64>) -> Self {
        Self { bins, min, max }
    }

    fn collect_errors(&self, axis: Axis, out: &mut Vec<FormError>) {
        if self.bins == Some(0) {
            out.push(FormError::ZeroBins { axis });
        }
        let min = finite(self.min, axis, "min", out);
        let max = finite(self.max, axis, "max", out);
        // The max input's lower limit follows the min input.
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                out.push(FormError::InvertedRange { axis, min, max });
            }
        }
    }
}

fn finite(
    value: Option<f64>,
    axis: Axis,
    bound: &'static str,
    out: &mut Vec<FormError>,
) -> Option<f64> {
    match value {
        Some(v) if !v.is_finite() => {
            out.push(FormError::NonFinite { axis, bound });
            None
        }
        other => other,
    }
}

/// Shared behavior of every job form.
pub trait JobForm {
    /// All validity errors, in field order. Empty means valid.
    fn errors(&self) -> Vec<FormError>;

    /// Build the request. Only called on a valid form.
    fn build(&self, run_number: u32) -> ClientRequest;

    fn check_validity(&self) -> bool {
        self.errors().is_empty()
    }

    /// Whether the submit control is enabled.
    fn submit_enabled(&self) -> bool {
        self.check_validity()
    }

    fn to_request(&self, run_number: u32) -> Result<ClientRequest, FormErrors> {
        let errors = self.errors();
        if !errors.is_empty() {
            return Err(FormErrors(errors));
        }
        Ok(self.build(run_number))
    }
}

/// A selected chronobox input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    pub board: String,
    pub number: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChronoboxForm {
    pub channel: Option<ChannelSelection>,
    pub time: AxisRange,
}

impl JobForm for ChronoboxForm {
    fn errors(&self) -> Vec<FormError> {
        let mut out = Vec::new();
        if self.channel.is_none() {
            out.push(FormError::MissingChannel);
        }
        self.time.collect_errors(Axis::Time, &mut out);
        out
    }

    fn build(&self, run_number: u32) -> ClientRequest {
        let (board_name, channel_number) = match &self.channel {
            Some(channel) => (channel.board.clone(), channel.number),
            None => (String::new(), 0),
        };
        ClientRequest::ChronoboxPlot {
            run_number,
            args: ChronoboxArgs {
                board_name,
                channel_number,
                t_bins: self.time.bins,
                t_max: self.time.max,
                t_min: self.time.min,
            },
        }
    }
}

/// Trigger scalers form. Each flag mirrors one checkbox.
#[derive(Debug, Clone, PartialEq)]
pub struct TrgScalersForm {
    pub time: AxisRange,
    pub drift_veto: bool,
    pub pulser: bool,
    pub scaledown: bool,
    pub input: bool,
    pub output: bool,
}

impl Default for TrgScalersForm {
    fn default() -> Self {
        Self {
            time: AxisRange::default(),
            drift_veto: false,
            pulser: false,
            scaledown: false,
            input: true,
            output: true,
        }
    }
}

impl TrgScalersForm {
    fn any_counter(&self) -> bool {
        self.drift_veto || self.pulser || self.scaledown || self.input || self.output
    }
}

impl JobForm for TrgScalersForm {
    fn errors(&self) -> Vec<FormError> {
        let mut out = Vec::new();
        self.time.collect_errors(Axis::Time, &mut out);
        if !self.any_counter() {
            out.push(FormError::NoCounterSelected);
        }
        out
    }

    fn build(&self, run_number: u32) -> ClientRequest {
        ClientRequest::TrgScalersPlot {
            run_number,
            args: TrgScalersArgs {
                t_bins: self.time.bins,
                t_max: self.time.max,
                t_min: self.time.min,
                include_drift_veto: self.drift_veto,
                include_pulser: self.pulser,
                include_scaledown: self.scaledown,
                remove_input: !self.input,
                remove_output: !self.output,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerticesForm {
    pub phi: AxisRange,
    pub r: AxisRange,
    pub t: AxisRange,
    pub z: AxisRange,
}

impl JobForm for VerticesForm {
    fn errors(&self) -> Vec<FormError> {
        let mut out = Vec::new();
        self.phi.collect_errors(Axis::Phi, &mut out);
        self.r.collect_errors(Axis::R, &mut out);
        self.t.collect_errors(Axis::Time, &mut out);
        self.z.collect_errors(Axis::Z, &mut out);
        out
    }

    fn build(&self, run_number: u32) -> ClientRequest {
        ClientRequest::VerticesPlot {
            run_number,
            args: VerticesArgs {
                phi_bins: self.phi.bins,
                phi_max: self.phi.max,
                phi_min: self.phi.min,
                r_bins: self.r.bins,
                r_max: self.r.max,
                r_min: self.r.min,
                t_bins: self.t.bins,
                t_max: self.t.max,
                t_min: self.t.min,
                z_bins: self.z.bins,
                z_max: self.z.max,
                z_min: self.z.min,
            },
        }
    }
}
