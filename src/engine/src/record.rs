//! Partition record stream
//!
//! Each partition appends the commands it receives, the events it writes
//! for accepted commands, rejections for refused ones and the command
//! distribution lifecycle.

use crate::command::Command;
use keystone_authz::Rejection;
use keystone_core::{Key, PartitionId};
use keystone_distribution::{DistributionEvent, DistributionIntent};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Authorization,
    Role,
    Group,
    Tenant,
    MappingRule,
    User,
    IdentitySetup,
    Deployment,
    ProcessInstance,
    CommandDistribution,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Authorization => "AUTHORIZATION",
            ValueType::Role => "ROLE",
            ValueType::Group => "GROUP",
            ValueType::Tenant => "TENANT",
            ValueType::MappingRule => "MAPPING_RULE",
            ValueType::User => "USER",
            ValueType::IdentitySetup => "IDENTITY_SETUP",
            ValueType::Deployment => "DEPLOYMENT",
            ValueType::ProcessInstance => "PROCESS_INSTANCE",
            ValueType::CommandDistribution => "COMMAND_DISTRIBUTION",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Command,
    Event,
    CommandRejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Create,
    Created,
    Update,
    Updated,
    Delete,
    Deleted,
    AddPermission,
    PermissionAdded,
    RemovePermission,
    PermissionRemoved,
    AddEntity,
    EntityAdded,
    RemoveEntity,
    EntityRemoved,
    Initialize,
    Initialized,
    Distribution(DistributionIntent),
}

impl Intent {
    /// The event intent of a command intent; event intents map to themselves
    pub fn event(self) -> Intent {
        match self {
            Intent::Create => Intent::Created,
            Intent::Update => Intent::Updated,
            Intent::Delete => Intent::Deleted,
            Intent::AddPermission => Intent::PermissionAdded,
            Intent::RemovePermission => Intent::PermissionRemoved,
            Intent::AddEntity => Intent::EntityAdded,
            Intent::RemoveEntity => Intent::EntityRemoved,
            Intent::Initialize => Intent::Initialized,
            other => other,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Create => "CREATE",
            Intent::Created => "CREATED",
            Intent::Update => "UPDATE",
            Intent::Updated => "UPDATED",
            Intent::Delete => "DELETE",
            Intent::Deleted => "DELETED",
            Intent::AddPermission => "ADD_PERMISSION",
            Intent::PermissionAdded => "PERMISSION_ADDED",
            Intent::RemovePermission => "REMOVE_PERMISSION",
            Intent::PermissionRemoved => "PERMISSION_REMOVED",
            Intent::AddEntity => "ADD_ENTITY",
            Intent::EntityAdded => "ENTITY_ADDED",
            Intent::RemoveEntity => "REMOVE_ENTITY",
            Intent::EntityRemoved => "ENTITY_REMOVED",
            Intent::Initialize => "INITIALIZE",
            Intent::Initialized => "INITIALIZED",
            Intent::Distribution(intent) => return write!(f, "{intent}"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordValue {
    Command(Command),
    Distribution(DistributionEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub position: u64,
    pub key: Key,
    pub partition_id: PartitionId,
    pub record_type: RecordType,
    pub value_type: ValueType,
    pub intent: Intent,
    pub value: RecordValue,
    pub rejection: Option<Rejection>,
    pub timestamp: i64,
}

impl Record {
    pub fn command(&self) -> Option<&Command> {
        match &self.value {
            RecordValue::Command(command) => Some(command),
            RecordValue::Distribution(_) => None,
        }
    }

    pub fn distribution(&self) -> Option<&DistributionEvent> {
        match &self.value {
            RecordValue::Distribution(event) => Some(event),
            RecordValue::Command(_) => None,
        }
    }

    pub fn is_event(&self) -> bool {
        self.record_type == RecordType::Event
    }
}

/// Append-only record stream of one partition
#[derive(Debug)]
pub struct RecordLog {
    partition_id: PartitionId,
    records: Vec<Record>,
}

impl RecordLog {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn append_command(&mut self, key: Key, command: &Command, timestamp: i64) -> u64 {
        self.append(
            key,
            RecordType::Command,
            command.value_type(),
            command.intent(),
            RecordValue::Command(command.clone()),
            None,
            timestamp,
        )
    }

    pub fn append_event(&mut self, key: Key, command: &Command, timestamp: i64) -> u64 {
        self.append(
            key,
            RecordType::Event,
            command.value_type(),
            command.event_intent(),
            RecordValue::Command(command.clone()),
            None,
            timestamp,
        )
    }

    pub fn append_rejection(
        &mut self,
        command: &Command,
        rejection: Rejection,
        timestamp: i64,
    ) -> u64 {
        self.append(
            0,
            RecordType::CommandRejection,
            command.value_type(),
            command.intent(),
            RecordValue::Command(command.clone()),
            Some(rejection),
            timestamp,
        )
    }

    pub fn append_distribution(&mut self, event: DistributionEvent) -> u64 {
        let record_type = match event.intent {
            DistributionIntent::Acknowledge => RecordType::Command,
            _ => RecordType::Event,
        };
        self.append(
            event.distribution_key,
            record_type,
            ValueType::CommandDistribution,
            Intent::Distribution(event.intent),
            RecordValue::Distribution(event.clone()),
            None,
            event.timestamp,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &mut self,
        key: Key,
        record_type: RecordType,
        value_type: ValueType,
        intent: Intent,
        value: RecordValue,
        rejection: Option<Rejection>,
        timestamp: i64,
    ) -> u64 {
        let position = self.records.len() as u64 + 1;
        self.records.push(Record {
            position,
            key,
            partition_id: self.partition_id,
            record_type,
            value_type,
            intent,
            value,
            rejection,
            timestamp,
        });
        position
    }

    /// Events of one value type and intent, in log order
    pub fn events(&self, value_type: ValueType, intent: Intent) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.is_event() && r.value_type == value_type && r.intent == intent)
            .collect()
    }

    pub fn rejections(&self) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.record_type == RecordType::CommandRejection)
            .collect()
    }

    /// Distribution lifecycle records for one distribution
    pub fn distribution(&self, distribution_key: Key) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| {
                r.distribution()
                    .map(|e| e.distribution_key == distribution_key)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Identity events in log order, as applied
    pub fn applied_commands(&self) -> Vec<&Command> {
        self.records
            .iter()
            .filter(|r| r.is_event())
            .filter_map(Record::command)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RoleValue;
    use keystone_distribution::QueueId;

    #[test]
    fn test_positions_are_sequential() {
        let mut log = RecordLog::new(1);
        let command = Command::CreateRole(RoleValue::new("r", "R"));

        assert_eq!(log.append_command(0, &command, 10), 1);
        assert_eq!(log.append_event(7, &command, 10), 2);
        assert_eq!(log.len(), 2);

        let created = log.events(ValueType::Role, Intent::Created);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].key, 7);
    }

    #[test]
    fn test_rejection_records_carry_reason() {
        let mut log = RecordLog::new(1);
        let command = Command::CreateRole(RoleValue::new("r", "R"));
        log.append_rejection(&command, Rejection::already_exists("exists"), 5);

        let rejections = log.rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].intent, Intent::Create);
        assert_eq!(rejections[0].rejection.as_ref().unwrap().reason, "exists");
        assert!(log.applied_commands().is_empty());
    }

    #[test]
    fn test_distribution_records() {
        let mut log = RecordLog::new(1);
        log.append_distribution(DistributionEvent {
            intent: DistributionIntent::Acknowledge,
            distribution_key: 3,
            partition_id: 2,
            queue: Some(QueueId::identity()),
            timestamp: 1,
        });
        log.append_distribution(DistributionEvent {
            intent: DistributionIntent::Finished,
            distribution_key: 3,
            partition_id: 1,
            queue: Some(QueueId::identity()),
            timestamp: 2,
        });

        let records = log.distribution(3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, RecordType::Command);
        assert_eq!(
            records[1].intent,
            Intent::Distribution(DistributionIntent::Finished)
        );
        assert_eq!(records[1].intent.to_string(), "FINISHED");
    }
}
