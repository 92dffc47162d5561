//! Types partagés par les décodeurs et la zone assemblée

use serde::{Deserialize, Serialize};

/// Identifiant technique de la zone racine (France métropolitaine)
pub const ROOT_ID_TECHNIQUE: &str = "PAYS007";

/// Chemin canonique de la zone racine
pub const ROOT_PATH: &str = "france";

/// Code INSEE d'un point de prévision (au moins 6 caractères)
pub type CodeInsee = String;

/// Niveau administratif d'une zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Taxonomy {
    #[serde(rename = "PAYS")]
    Pays,
    #[serde(rename = "REGION")]
    Region,
    #[serde(rename = "DEPARTEMENT")]
    Departement,
    /// Valeur amont inconnue (commune, massif...)
    #[serde(rename = "AUTRE", other)]
    Autre,
}

impl Taxonomy {
    /// Nom amont de la taxonomie
    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::Pays => "PAYS",
            Taxonomy::Region => "REGION",
            Taxonomy::Departement => "DEPARTEMENT",
            Taxonomy::Autre => "AUTRE",
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Métadonnées de la carte (bloc `mf_map_layers_v2`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    #[serde(default)]
    pub nid: String,

    /// Nom affiché ("Isère", "France"...)
    pub name: String,

    /// Chemin amont de la page
    pub path: String,

    pub taxonomy: Taxonomy,

    /// Répertoire des fonds de carte
    pub path_assets: String,

    /// Identifiant technique ("PAYS007", "REGIN10", "DEPT38"...)
    #[serde(rename = "field_id_technique")]
    pub id_technique: String,
}

/// Sous-zone déclarée par la page amont
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subzone {
    pub path: String,
    pub name: String,
}

/// Élément du fil d'Ariane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbItem {
    pub nom: String,
    pub path: String,
}

impl BreadcrumbItem {
    pub fn new(nom: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            nom: nom.into(),
            path: path.into(),
        }
    }
}

/// Fil d'Ariane ordonné de la racine vers la zone elle-même
pub type Breadcrumb = Vec<BreadcrumbItem>;
