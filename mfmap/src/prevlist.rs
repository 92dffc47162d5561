//! Prévisions pivotées par jour puis par moment
//!
//! L'amont livre les prévisions point par point ; la page les affiche en
//! lignes (un jour) de cartes (un moment), chaque carte portant tous les
//! points. `PrevList` est cette vue pivotée.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::echeance::{days_between, Moment};
use crate::multiforecast::{Daily, Forecast, PointFeature};
use crate::types::CodeInsee;

/// Prévisions indexées par date calendaire (UTC)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrevList(pub BTreeMap<NaiveDate, PrevsAtDay>);

/// Une ligne : les cartes d'une journée
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrevsAtDay(pub BTreeMap<Moment, PrevsAtMoment>);

/// Une carte : tous les points à une échéance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevsAtMoment {
    pub echeance: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub prevs: BTreeMap<CodeInsee, PrevAtPoi>,
}

/// Prévision d'un point à une échéance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevAtPoi {
    pub titre: String,
    pub coords: Coord<f64>,
    /// Absente pour la case journalière
    pub forecast: Option<Forecast>,
    pub daily: Option<Daily>,
}

/// Nature d'une carte selon les prévisions qu'elle porte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terme {
    Court,
    Tendance,
    Inconnu,
}

impl PrevList {
    /// Pivote les prévisions point → échéance en jour → moment → point
    pub fn build(features: &[PointFeature]) -> PrevList {
        let mut pl = PrevList::default();

        for feat in features {
            for f in &feat.forecasts {
                let e = f.echeance();
                let daily = feat.daily_at(&e);
                let pad = pl.0.entry(e.date).or_default();

                if let Some(d) = daily {
                    pad.insert(Moment::Journalier, feat, None, Some(d));
                }
                pad.insert(e.moment, feat, Some(f), daily);
            }
        }
        pl
    }

    /// Complète avec l'historique de `old`, pour les dates situées entre
    /// `day_min` et `day_max` jours de `today`. Une case déjà présente n'est
    /// jamais écrasée.
    pub fn merge(&mut self, old: &PrevList, day_min: i64, day_max: i64, today: NaiveDate) {
        for (date, old_pad) in &old.0 {
            let n = days_between(*date, today);
            if n < day_min || n > day_max {
                continue;
            }
            let pad = self.0.entry(*date).or_default();
            for (moment, pam) in &old_pad.0 {
                pad.0.entry(*moment).or_insert_with(|| pam.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&PrevsAtDay> {
        self.0.get(date)
    }
}

impl PrevsAtDay {
    fn insert(
        &mut self,
        moment: Moment,
        feat: &PointFeature,
        forecast: Option<&Forecast>,
        daily: Option<&Daily>,
    ) {
        let echeance = match (forecast, daily) {
            (Some(f), _) => f.time(),
            (None, Some(d)) => d.time,
            (None, None) => return,
        };

        let pam = self.0.entry(moment).or_insert_with(|| PrevsAtMoment {
            echeance,
            updated: feat.update_time,
            prevs: BTreeMap::new(),
        });
        pam.echeance = echeance;
        pam.updated = feat.update_time;
        pam.prevs.insert(
            feat.insee.clone(),
            PrevAtPoi {
                titre: feat.name.clone(),
                coords: feat.coords,
                forecast: forecast.cloned(),
                daily: daily.cloned(),
            },
        );
    }

    pub fn get(&self, moment: Moment) -> Option<&PrevsAtMoment> {
        self.0.get(&moment)
    }

    /// Une journée s'affiche en tendance dès qu'un de ses moments
    /// (dans l'ordre d'affichage) ne porte que des prévisions longues
    pub fn is_long_term(&self) -> bool {
        for m in Moment::COURTS {
            if let Some(pam) = self.0.get(&m) {
                if pam.terme() == Terme::Tendance {
                    return true;
                }
            }
        }
        false
    }
}

impl PrevsAtMoment {
    pub fn terme(&self) -> Terme {
        let (mut long, mut court) = (0usize, 0usize);
        for p in self.prevs.values() {
            match &p.forecast {
                Some(Forecast::Long(_)) => long += 1,
                Some(Forecast::Court(_)) => court += 1,
                None => {}
            }
        }

        match (court, long) {
            (0, l) if l > 0 => Terme::Tendance,
            (c, 0) if c > 0 => Terme::Court,
            (0, 0) => {
                warn!(echeance = %self.echeance, "No forecast available at this moment");
                Terme::Inconnu
            }
            _ => {
                warn!(echeance = %self.echeance, court, long, "Short and long-term forecasts mixed at this moment");
                Terme::Inconnu
            }
        }
    }
}
