use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! file_slots {
    ($( $variant:ident => $field:ident : $wire:literal ),+ $(,)?) => {
        /// A named attachment category on a pulp document.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum FileSlot {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl FileSlot {
            pub const ALL: &'static [FileSlot] = &[$(FileSlot::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(FileSlot::$variant => $wire,)+
                }
            }
        }

        /// The fixed set of attachment slots. Each holds a weak reference to
        /// a blob or nothing.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct FileSlots {
            $(
                #[serde(rename = $wire, default)]
                pub $field: Option<Uuid>,
            )+
        }

        impl FileSlots {
            pub fn get(&self, slot: FileSlot) -> Option<Uuid> {
                match slot {
                    $(FileSlot::$variant => self.$field,)+
                }
            }

            pub fn set(&mut self, slot: FileSlot, blob_id: Option<Uuid>) {
                match slot {
                    $(FileSlot::$variant => self.$field = blob_id,)+
                }
            }
        }
    };
}

file_slots! {
    GeoToProducerInvoice => geo_to_producer_invoice: "geoToProducerInvoice",
    WoodTransportDocs => wood_transport_docs: "woodTransportDocs",
    ProducerToSupplierInvoice => producer_to_supplier_invoice: "producerToSupplierInvoice",
    PulpTransportDocs => pulp_transport_docs: "pulpTransportDocs",
    SupplierToItcInvoice => supplier_to_itc_invoice: "supplierToITCInvoice",
    ShippingDocs => shipping_docs: "shippingDocs",
    DdsSummary => dds_summary: "ddsSummary",
    LegalHarvestDocs => legal_harvest_docs: "legalHarvestDocs",
    FscCertificates => fsc_certificates: "fscCertificates",
    FscCocCertificate => fsc_coc_certificate: "fscCocCertificate",
    ProducerDeclaration => producer_declaration: "producerDeclaration",
    ProducerLicense => producer_license: "producerLicense",
    SupplierLicense => supplier_license: "supplierLicense",
    GhgCertifications => ghg_certifications: "ghgCertifications",
    SafetyCertifications => safety_certifications: "safetyCertifications",
    HumanRightsPolicies => human_rights_policies: "humanRightsPolicies",
    EmployeeRecords => employee_records: "employeeRecords",
}

impl FileSlots {
    /// Every slot in declaration order, paired with its reference.
    pub fn iter(&self) -> impl Iterator<Item = (FileSlot, Option<Uuid>)> + '_ {
        FileSlot::ALL.iter().map(move |slot| (*slot, self.get(*slot)))
    }

    /// Distinct blob ids referenced by any slot.
    pub fn referenced(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.iter().filter_map(|(_, id)| id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl std::fmt::Display for FileSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
