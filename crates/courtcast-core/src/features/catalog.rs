// Default model feature list, grouped the way the source tables are.

use super::labels::{BACK_TO_BACK, HOME_COURT};

const PLAYTYPE: [&str; 4] = ["2FGA_cns", "3PA_cns", "2FGA_pullup", "3PA_pullup"];

const ZONE: [&str; 6] = ["RA_FGA", "Mid_FGA", "LC3_FGA", "RC3_FGA", "C3_FGA", "AB3_FGA"];

const MISC: [&str; 4] = ["PTS_OFF_TOV", "PTS_2ND_CHANCE", "PTS_FB", "PTS_PAINT"];

const TRADITIONAL: [&str; 8] = ["AGE", "W_PCT", "MIN", "FGA", "3PA", "FTA", "FG_PCT", "3P_PCT"];

const OPP_PLAYTYPE: [&str; 4] = [
    "Opp_2FGA_cns",
    "Opp_3PA_cns",
    "Opp_2FGA_pullup",
    "Opp_3PA_pullup",
];

const OPP_ZONE: [&str; 6] = [
    "Opp_RA_FGA",
    "Opp_Mid_FGA",
    "Opp_LC3_FGA",
    "Opp_RC3_FGA",
    "Opp_C3_FGA",
    "Opp_AB3_FGA",
];

const OPP_MISC: [&str; 4] = [
    "OPP_PTS_OFF_TOV",
    "OPP_PTS_2ND_CHANCE",
    "OPP_PTS_FB",
    "OPP_PTS_PAINT",
];

const OPP_TRADITIONAL: [&str; 6] = [
    "OPP_FGM",
    "OPP_FGA",
    "OPP_3PA",
    "OPP_FTA",
    "OPP_FG_PCT",
    "OPP_3P_PCT",
];

/// Player columns whose injury-block sums feed the model.
const INJURY_BASE: [&str; 14] = [
    "2FGA_cns",
    "3PA_cns",
    "2FGA_pullup",
    "3PA_pullup",
    "RA_FGA",
    "Mid_FGA",
    "LC3_FGA",
    "RC3_FGA",
    "C3_FGA",
    "AB3_FGA",
    "PTS_OFF_TOV",
    "PTS_2ND_CHANCE",
    "PTS_FB",
    "PTS_PAINT",
];

/// The default feature list, in model column order.
pub fn default_features() -> Vec<String> {
    let mut features: Vec<String> = PLAYTYPE
        .iter()
        .chain(ZONE.iter())
        .chain(MISC.iter())
        .chain(TRADITIONAL.iter())
        .chain(OPP_PLAYTYPE.iter())
        .chain(OPP_ZONE.iter())
        .chain(OPP_MISC.iter())
        .chain(OPP_TRADITIONAL.iter())
        .map(|c| c.to_string())
        .collect();
    features.extend(
        INJURY_BASE
            .iter()
            .map(|c| format!("{c}{}", super::injury::UNKNOWN_SUFFIX)),
    );
    features.push(BACK_TO_BACK.to_string());
    features.push(HOME_COURT.to_string());
    features
}

/// The configured override if present, else the default list.
pub fn feature_list(override_list: Option<&[String]>) -> Vec<String> {
    match override_list {
        Some(list) => list.to_vec(),
        None => default_features(),
    }
}
