// src/models/threat.rs

use serde::Serialize;

/// One entry of the fixed threat taxonomy shown to screeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreatOption {
    pub id: &'static str,
    pub label: &'static str,
}

pub const THREAT_TYPES: [ThreatOption; 16] = [
    ThreatOption { id: "el_bombasi", label: "El Bombası" },
    ThreatOption { id: "patlayici_duzenek", label: "Patlayıcı Düzenek" },
    ThreatOption { id: "bicak", label: "Bıçak" },
    ThreatOption { id: "havai_fisek", label: "Havai Fişek" },
    ThreatOption { id: "sivi_madde", label: "Sıvı Madde" },
    ThreatOption { id: "sustali_bicak", label: "Sustalı Bıçak" },
    ThreatOption { id: "keskin_uclu_alet", label: "Keskin Uçlu Alet" },
    ThreatOption { id: "delici_nesne", label: "Delici Nesne" },
    ThreatOption { id: "kamufle_silah", label: "Kamufle Edilmiş Silah" },
    ThreatOption { id: "makas", label: "Makas" },
    ThreatOption { id: "silah_parcasi", label: "Silah Parçası" },
    ThreatOption { id: "mermi", label: "Mermi" },
    ThreatOption { id: "sarjor", label: "Şarjör" },
    ThreatOption { id: "fisek", label: "Fişek" },
    ThreatOption { id: "sis_bombasi", label: "Sis Bombası" },
    ThreatOption { id: "diger", label: "Diğer" },
];

pub fn find_threat_type(id: &str) -> Option<&'static ThreatOption> {
    THREAT_TYPES.iter().find(|t| t.id == id)
}
