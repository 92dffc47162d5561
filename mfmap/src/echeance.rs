//! Échéances : couple (date, moment) ordonné

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Moment de la journée d'une prévision
///
/// L'ordre de déclaration fixe l'ordre d'affichage ; `Journalier` est une
/// case à part, placée après les quatre moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Moment {
    #[serde(rename = "matin")]
    Matin,
    #[serde(rename = "après-midi")]
    ApresMidi,
    #[serde(rename = "soirée")]
    Soiree,
    #[serde(rename = "nuit")]
    Nuit,
    #[serde(rename = "daily")]
    Journalier,
}

impl Moment {
    /// Les quatre moments courts, dans l'ordre d'affichage
    pub const COURTS: [Moment; 4] = [Moment::Matin, Moment::ApresMidi, Moment::Soiree, Moment::Nuit];

    /// Nom amont du moment
    pub fn as_str(&self) -> &'static str {
        match self {
            Moment::Matin => "matin",
            Moment::ApresMidi => "après-midi",
            Moment::Soiree => "soirée",
            Moment::Nuit => "nuit",
            Moment::Journalier => "daily",
        }
    }

    /// Décode un moment amont ; `daily` n'est jamais transmis par l'API
    pub fn from_upstream(s: &str) -> Option<Moment> {
        Moment::COURTS.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizon de prévision, trié par date puis par moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Echeance {
    pub date: NaiveDate,
    pub moment: Moment,
}

impl Echeance {
    /// Échéance d'une prévision courte.
    /// La nuit commence après minuit mais s'affiche avec la veille.
    pub fn of_forecast(moment: Moment, time: DateTime<Utc>) -> Self {
        let mut date = time.date_naive();
        if moment == Moment::Nuit {
            date = date.checked_sub_days(Days::new(1)).unwrap_or(date);
        }
        Self { date, moment }
    }

    /// Échéance d'une prévision journalière
    pub fn of_daily(time: DateTime<Utc>) -> Self {
        Self {
            date: time.date_naive(),
            moment: Moment::Journalier,
        }
    }
}

impl std::fmt::Display for Echeance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.moment)
    }
}

/// Nombre de jours calendaires entre `date` et `today`
pub fn days_between(date: NaiveDate, today: NaiveDate) -> i64 {
    date.signed_duration_since(today).num_days()
}
