// Player-name normalization and the franchise directory.
//
// Every table is joined on player name strings, so every loader and every
// scraper must run names through `normalize_player_name` before a row is
// stored or joined. A divergence here drops rows silently.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a player name for cross-source joins.
///
/// Decomposes to NFD, drops combining marks (`Jokić` -> `Jokic`), removes
/// the ` Jr.` suffix and trims surrounding whitespace.
pub fn normalize_player_name(raw: &str) -> String {
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.replace(" Jr.", "").trim().to_string()
}

// ---------------------------------------------------------------------------
// Franchise directory
// ---------------------------------------------------------------------------

/// One NBA franchise as the various sources refer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Franchise {
    /// Stats-API team id.
    pub id: u64,
    /// Three-letter code used as the `Team` key in every table.
    pub tricode: &'static str,
    /// Full name as printed by the stats API and the injury page.
    pub full_name: &'static str,
    /// Nickname as printed on the games page.
    pub nickname: &'static str,
}

pub const FRANCHISES: [Franchise; 30] = [
    Franchise { id: 1610612737, tricode: "ATL", full_name: "Atlanta Hawks", nickname: "Hawks" },
    Franchise { id: 1610612738, tricode: "BOS", full_name: "Boston Celtics", nickname: "Celtics" },
    Franchise { id: 1610612751, tricode: "BKN", full_name: "Brooklyn Nets", nickname: "Nets" },
    Franchise { id: 1610612766, tricode: "CHA", full_name: "Charlotte Hornets", nickname: "Hornets" },
    Franchise { id: 1610612741, tricode: "CHI", full_name: "Chicago Bulls", nickname: "Bulls" },
    Franchise { id: 1610612739, tricode: "CLE", full_name: "Cleveland Cavaliers", nickname: "Cavaliers" },
    Franchise { id: 1610612742, tricode: "DAL", full_name: "Dallas Mavericks", nickname: "Mavericks" },
    Franchise { id: 1610612743, tricode: "DEN", full_name: "Denver Nuggets", nickname: "Nuggets" },
    Franchise { id: 1610612765, tricode: "DET", full_name: "Detroit Pistons", nickname: "Pistons" },
    Franchise { id: 1610612744, tricode: "GSW", full_name: "Golden State Warriors", nickname: "Warriors" },
    Franchise { id: 1610612745, tricode: "HOU", full_name: "Houston Rockets", nickname: "Rockets" },
    Franchise { id: 1610612754, tricode: "IND", full_name: "Indiana Pacers", nickname: "Pacers" },
    Franchise { id: 1610612746, tricode: "LAC", full_name: "LA Clippers", nickname: "Clippers" },
    Franchise { id: 1610612747, tricode: "LAL", full_name: "Los Angeles Lakers", nickname: "Lakers" },
    Franchise { id: 1610612763, tricode: "MEM", full_name: "Memphis Grizzlies", nickname: "Grizzlies" },
    Franchise { id: 1610612748, tricode: "MIA", full_name: "Miami Heat", nickname: "Heat" },
    Franchise { id: 1610612749, tricode: "MIL", full_name: "Milwaukee Bucks", nickname: "Bucks" },
    Franchise { id: 1610612750, tricode: "MIN", full_name: "Minnesota Timberwolves", nickname: "Timberwolves" },
    Franchise { id: 1610612740, tricode: "NOP", full_name: "New Orleans Pelicans", nickname: "Pelicans" },
    Franchise { id: 1610612752, tricode: "NYK", full_name: "New York Knicks", nickname: "Knicks" },
    Franchise { id: 1610612760, tricode: "OKC", full_name: "Oklahoma City Thunder", nickname: "Thunder" },
    Franchise { id: 1610612753, tricode: "ORL", full_name: "Orlando Magic", nickname: "Magic" },
    Franchise { id: 1610612755, tricode: "PHI", full_name: "Philadelphia 76ers", nickname: "76ers" },
    Franchise { id: 1610612756, tricode: "PHX", full_name: "Phoenix Suns", nickname: "Suns" },
    Franchise { id: 1610612757, tricode: "POR", full_name: "Portland Trail Blazers", nickname: "Trail Blazers" },
    Franchise { id: 1610612758, tricode: "SAC", full_name: "Sacramento Kings", nickname: "Kings" },
    Franchise { id: 1610612759, tricode: "SAS", full_name: "San Antonio Spurs", nickname: "Spurs" },
    Franchise { id: 1610612761, tricode: "TOR", full_name: "Toronto Raptors", nickname: "Raptors" },
    Franchise { id: 1610612762, tricode: "UTA", full_name: "Utah Jazz", nickname: "Jazz" },
    Franchise { id: 1610612764, tricode: "WAS", full_name: "Washington Wizards", nickname: "Wizards" },
];

/// Look up a franchise by stats-API team id.
pub fn franchise_by_id(id: u64) -> Option<&'static Franchise> {
    FRANCHISES.iter().find(|f| f.id == id)
}

/// Map a full team name, a nickname or a tricode to the tricode. Returns
/// `None` for names outside the directory (All-Star teams, typos).
pub fn tricode_for(name: &str) -> Option<&'static str> {
    let name = name.trim();
    FRANCHISES
        .iter()
        .find(|f| f.full_name == name || f.nickname == name || f.tricode == name)
        .map(|f| f.tricode)
}
