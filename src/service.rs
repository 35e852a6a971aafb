use crate::CharacteristicDescriptor;
use btleplug::api::Service as BtleService;
use uuid::Uuid;

/// A discovered GATT service together with its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub(crate) uuid:            Uuid,
    pub(crate) characteristics: Vec<CharacteristicDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(uuid: Uuid, characteristics: Vec<CharacteristicDescriptor>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }

    pub fn characteristics(&self) -> &[CharacteristicDescriptor] {
        &self.characteristics
    }

    /// Get characteristic by UUID
    pub fn characteristic(&self, uuid: Uuid) -> Option<&CharacteristicDescriptor> {
        self.characteristics
            .iter()
            .find(|characteristic| characteristic.uuid == uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl From<&BtleService> for ServiceDescriptor {
    fn from(service: &BtleService) -> Self {
        Self {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .iter()
                .map(CharacteristicDescriptor::from)
                .collect::<Vec<_>>(),
        }
    }
}
