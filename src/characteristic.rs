use btleplug::api::Characteristic as BtleCharacteristic;
use uuid::Uuid;

/// A GATT characteristic and, once read, its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub(crate) uuid:         Uuid,
    pub(crate) service_uuid: Uuid,
    pub(crate) value:        Option<Vec<u8>>,
}

impl CharacteristicDescriptor {
    pub fn new(uuid: Uuid, service_uuid: Uuid) -> Self {
        Self {
            uuid,
            service_uuid,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// UUID of the service this characteristic belongs to
    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    /// Raw value, absent until a read has completed
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

impl From<&BtleCharacteristic> for CharacteristicDescriptor {
    fn from(characteristic: &BtleCharacteristic) -> Self {
        Self::new(characteristic.uuid, characteristic.service_uuid)
    }
}
