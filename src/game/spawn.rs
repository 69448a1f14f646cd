//! Spawn placement by game mode and team

use glam::Vec3;
use rand::Rng;

/// Eye height every spawn is placed at
const SPAWN_HEIGHT: f32 = 40.0;

/// How a game mode places its players
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// Two teams, one fixed base each
    Team,
    /// Everyone for themselves, fixed named points
    Solo,
    /// Anything else: jittered map quadrants
    Open,
}

impl ModeKind {
    pub fn classify(game_mode: &str) -> Self {
        match game_mode.trim().to_ascii_lowercase().as_str() {
            "team_deathmatch" | "tdm" | "team" => Self::Team,
            "free_for_all" | "ffa" | "solo" | "elimination" => Self::Solo,
            _ => Self::Open,
        }
    }
}

/// The two sides of a team match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn parse(team: &str) -> Option<Self> {
        match team.trim().to_ascii_lowercase().as_str() {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }
}

/// A resolved spawn location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub name: &'static str,
    pub position: Vec3,
    pub team: Option<Team>,
}

const RED_BASE: SpawnPoint = SpawnPoint {
    name: "red_base",
    position: Vec3::new(-450.0, SPAWN_HEIGHT, 0.0),
    team: Some(Team::Red),
};

const BLUE_BASE: SpawnPoint = SpawnPoint {
    name: "blue_base",
    position: Vec3::new(450.0, SPAWN_HEIGHT, 0.0),
    team: Some(Team::Blue),
};

/// Named points for solo modes
pub const SOLO_POINTS: [SpawnPoint; 6] = [
    solo("north_tower", 0.0, -600.0),
    solo("south_gate", 0.0, 600.0),
    solo("east_yard", 600.0, 0.0),
    solo("west_yard", -600.0, 0.0),
    solo("plaza", 150.0, 150.0),
    solo("ruins", -150.0, -150.0),
];

const fn solo(name: &'static str, x: f32, z: f32) -> SpawnPoint {
    SpawnPoint {
        name,
        position: Vec3::new(x, SPAWN_HEIGHT, z),
        team: None,
    }
}

/// A map region spawns are scattered within
#[derive(Debug, Clone, Copy)]
pub struct Quadrant {
    pub name: &'static str,
    pub center_x: f32,
    pub center_z: f32,
    /// Max offset on each horizontal axis
    pub jitter: f32,
}

pub const QUADRANTS: [Quadrant; 5] = [
    Quadrant { name: "north", center_x: 0.0, center_z: -400.0, jitter: 120.0 },
    Quadrant { name: "south", center_x: 0.0, center_z: 400.0, jitter: 120.0 },
    Quadrant { name: "east", center_x: 400.0, center_z: 0.0, jitter: 120.0 },
    Quadrant { name: "west", center_x: -400.0, center_z: 0.0, jitter: 120.0 },
    Quadrant { name: "center", center_x: 0.0, center_z: 0.0, jitter: 80.0 },
];

/// Pick a spawn for `(game_mode, team)`.
///
/// Team modes are deterministic per team. Solo modes pick one of the named
/// points and open modes scatter inside a random quadrant. Concurrent spawns
/// may overlap.
pub fn resolve<R: Rng + ?Sized>(game_mode: &str, team: &str, rng: &mut R) -> SpawnPoint {
    match ModeKind::classify(game_mode) {
        ModeKind::Team => match Team::parse(team) {
            Some(Team::Red) => RED_BASE,
            Some(Team::Blue) => BLUE_BASE,
            None => scatter(rng),
        },
        ModeKind::Solo => SOLO_POINTS[rng.gen_range(0..SOLO_POINTS.len())],
        ModeKind::Open => scatter(rng),
    }
}

fn scatter<R: Rng + ?Sized>(rng: &mut R) -> SpawnPoint {
    let quadrant = &QUADRANTS[rng.gen_range(0..QUADRANTS.len())];
    let x = quadrant.center_x + rng.gen_range(-quadrant.jitter..=quadrant.jitter);
    let z = quadrant.center_z + rng.gen_range(-quadrant.jitter..=quadrant.jitter);
    SpawnPoint {
        name: quadrant.name,
        position: Vec3::new(x, SPAWN_HEIGHT, z),
        team: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn team_spawns_are_fixed_and_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let red: Vec<Vec3> = (0..20)
            .map(|_| resolve("team_deathmatch", "red", &mut rng).position)
            .collect();
        let blue = resolve("team_deathmatch", "blue", &mut rng).position;

        assert!(red.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(resolve("TDM", "Blue", &mut rng).position, blue);
        assert_ne!(red[0], blue);
    }

    #[test]
    fn unknown_team_falls_through_to_quadrants() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let spawn = resolve("team", "green", &mut rng);
        assert!(QUADRANTS.iter().any(|q| q.name == spawn.name));
        assert_eq!(spawn.team, None);
    }

    #[test]
    fn solo_spawns_use_named_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            let spawn = resolve("ffa", "", &mut rng);
            assert!(SOLO_POINTS.contains(&spawn));
        }
    }

    #[test]
    fn open_spawns_stay_inside_their_quadrant() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let spawn = resolve("capture_the_flag", "red", &mut rng);
            let q = QUADRANTS.iter().find(|q| q.name == spawn.name).unwrap();
            assert!((spawn.position.x - q.center_x).abs() <= q.jitter);
            assert!((spawn.position.z - q.center_z).abs() <= q.jitter);
            assert_eq!(spawn.position.y, SPAWN_HEIGHT);
        }
    }

    #[test]
    fn open_spawns_vary_between_calls() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = resolve("sandbox", "", &mut rng).position;
        let b = resolve("sandbox", "", &mut rng).position;
        assert_ne!(a, b);
    }

    #[test]
    fn mode_classification() {
        assert_eq!(ModeKind::classify("Team_Deathmatch"), ModeKind::Team);
        assert_eq!(ModeKind::classify("elimination"), ModeKind::Solo);
        assert_eq!(ModeKind::classify("zombies"), ModeKind::Open);
    }
}
