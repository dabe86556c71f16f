use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    error::Result,
    params::ControlValues,
    transport::{Endpoint, UdpSender},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlField {
    Ipd,
    SubviewportScale,
    VrFilterStrength,
    GyroSensitive,
}

impl ControlField {
    pub fn key(&self) -> &'static str {
        match self {
            ControlField::Ipd => "ipd",
            ControlField::SubviewportScale => "subviewport_scale",
            ControlField::VrFilterStrength => "vr_filter_strength",
            ControlField::GyroSensitive => "gyro_sensitive",
        }
    }
}

/// One operator command for the remote scene.
///
/// `Reset` zeroes the remote rotation. `Set` carries one or more controls in
/// real units and goes out as a single message.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    Reset,
    Set(Vec<(ControlField, f32)>),
}

impl ControlCommand {
    pub fn set(field: ControlField, value: f32) -> Self {
        ControlCommand::Set(vec![(field, value)])
    }

    /// All present controls batched into one message.
    pub fn from_values(values: &ControlValues) -> Self {
        ControlCommand::Set(fields_of(values))
    }

    /// One single-key message per present control.
    pub fn split_values(values: &ControlValues) -> Vec<Self> {
        fields_of(values)
            .into_iter()
            .map(|(field, value)| ControlCommand::set(field, value))
            .collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn describe(&self) -> String {
        match self {
            ControlCommand::Reset => "reset".to_string(),
            ControlCommand::Set(fields) => fields
                .iter()
                .map(|(field, value)| format!("{}={value}", field.key()))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl Serialize for ControlCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ControlCommand::Reset => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("reset", &0)?;
                map.end()
            }
            ControlCommand::Set(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (field, value) in fields {
                    map.serialize_entry(field.key(), value)?;
                }
                map.end()
            }
        }
    }
}

fn fields_of(values: &ControlValues) -> Vec<(ControlField, f32)> {
    let mut fields = vec![
        (ControlField::Ipd, values.ipd),
        (ControlField::SubviewportScale, values.subviewport_scale),
    ];
    if let Some(strength) = values.vr_filter_strength {
        fields.push((ControlField::VrFilterStrength, strength));
    }
    fields.push((ControlField::GyroSensitive, values.gyro_sensitive));
    fields
}

/// Encode and send one command synchronously.
pub fn send_command(
    sender: &UdpSender,
    endpoint: &Endpoint,
    command: &ControlCommand,
) -> Result<usize> {
    let bytes = command.encode()?;
    sender.send(&bytes, endpoint)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendMode {
    #[default]
    Batched,
    Individual,
}

/// Result of one dispatched action, phrased for the operator.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub command: ControlCommand,
    pub endpoint: Endpoint,
    pub result: std::result::Result<usize, String>,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.result {
            Ok(_) => format!("sent {} to {}", self.command.describe(), self.endpoint),
            Err(err) => format!("failed to send {}: {err}", self.command.describe()),
        }
    }
}

/// Runs each control action on its own short-lived worker.
///
/// Workers only see the endpoint and command captured at launch plus a clone
/// of the sender, and report back on the feedback channel.
#[derive(Clone, Debug)]
pub struct ControlDispatcher {
    sender: UdpSender,
    feedback_tx: Sender<ActionOutcome>,
}

impl ControlDispatcher {
    pub fn new(sender: UdpSender) -> (Self, Receiver<ActionOutcome>) {
        let (feedback_tx, feedback_rx) = unbounded();
        (
            Self {
                sender,
                feedback_tx,
            },
            feedback_rx,
        )
    }

    pub fn dispatch(&self, endpoint: Endpoint, command: ControlCommand) {
        let sender = self.sender.clone();
        let feedback_tx = self.feedback_tx.clone();

        thread::spawn(move || {
            let result =
                send_command(&sender, &endpoint, &command).map_err(|err| err.to_string());
            match &result {
                Ok(bytes) => {
                    log::debug!("sent {} ({bytes} bytes) to {endpoint}", command.describe())
                }
                Err(err) => log::warn!("control send failed: {err}"),
            }
            let _ = feedback_tx.send(ActionOutcome {
                command,
                endpoint,
                result,
            });
        });
    }

    /// Dispatch the given values and return how many outcomes will follow.
    pub fn dispatch_values(
        &self,
        endpoint: &Endpoint,
        values: &ControlValues,
        mode: SendMode,
    ) -> usize {
        let commands = match mode {
            SendMode::Batched => vec![ControlCommand::from_values(values)],
            SendMode::Individual => ControlCommand::split_values(values),
        };
        let count = commands.len();
        for command in commands {
            self.dispatch(endpoint.clone(), command);
        }
        count
    }
}
