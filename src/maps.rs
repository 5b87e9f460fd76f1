// `.` free, `o` interactive, `#` wall, `=` path, `~` inaccessible.

use crate::types::GridPos;

pub struct MapDefinition {
    pub name: &'static str,
    pub rows: &'static [&'static str],
    pub spawn: GridPos,
    pub safe_player: GridPos,
    pub safe_agent: GridPos,
}

const CAMPUS_ROWS: &[&str] = &[
    "################################",
    "#.ooo.=..................=.....#",
    "#.ooo.=..................=.....#",
    "#.....=..................=.....#",
    "#==============================#",
    "#.....=........=.........=.....#",
    "#.....=..####..=..#####..=.~~~~#",
    "#.....=..####..=..#####..=.~~~~#",
    "#.....=..#o##..=..#####..=.~~~~#",
    "#.....=..####..=..#####..=.~~~~#",
    "#.....=........=..#####..=.~~~~#",
    "#.....=........=.........=.~~~~#",
    "#.....=........=.........=.~~~~#",
    "#.....=........=.........=.....#",
    "#==============================#",
    "#.....=..................=.....#",
    "#.....=.oooo.............=.....#",
    "#.....=.oooo.............=.....#",
    "#.....=..................=.....#",
    "################################",
];

const CAFETERIA_ROWS: &[&str] = &[
    "################################",
    "#..............................#",
    "#==============================#",
    "#..=...........=............=..#",
    "#..=...........=............=oo#",
    "#..=..o.o.o.o..=..o.o.o.....=oo#",
    "#..=...........=............=oo#",
    "#..=..o.o.o.o..=..o.o.o.....=oo#",
    "#..=........o.===...........=..#",
    "#==============================#",
    "#..=..........===......#####=..#",
    "#..=...........=......#~~~~~=..#",
    "#..=..o.o.o.o..=..o.o.#~~~~~=..#",
    "#..=...........=......#~~~~~=..#",
    "#..=..o.o.o.o..=..o.o.#~~~~~=..#",
    "#..=...........=......#~~~~~=..#",
    "#..=...........=......#~~~~~=..#",
    "#==============================#",
    "#..............................#",
    "################################",
];

const LIBRARY_ROWS: &[&str] = &[
    "################################",
    "#..............................#",
    "#..............................#",
    "#==============================#",
    "#.=.............=............=.#",
    "#.=..#..#..#....=...#..#..#..=.#",
    "#.=..#..#..#....=.o.#..#..#..=.#",
    "#.=..#..#..#....=.o.#..#..#..=.#",
    "#.=..#..#..#....=.o.#..#..#..=.#",
    "#.=.............=............=.#",
    "#.=..#..#..#.oo.=...#..#..#..=.#",
    "#.=..#..#..#.oo.=...#..#..#..=.#",
    "#.=..#..#..#.oo.=...#..#..#..=.#",
    "#.=..#..#..#....=...#..#..#..=.#",
    "#.=..#..#..#....=...#..#..#..=.#",
    "#.=.............=............=.#",
    "#==============================#",
    "#...~~~~~~~....................#",
    "#...~~~~~~~....................#",
    "################################",
];

pub fn builtin_maps() -> Vec<MapDefinition> {
    vec![
        MapDefinition {
            name: "campus",
            rows: CAMPUS_ROWS,
            spawn: GridPos { x: 2, y: 3 },
            safe_player: GridPos { x: 3, y: 3 },
            safe_agent: GridPos { x: 6, y: 4 },
        },
        MapDefinition {
            name: "cafeteria",
            rows: CAFETERIA_ROWS,
            spawn: GridPos { x: 1, y: 1 },
            safe_player: GridPos { x: 2, y: 1 },
            safe_agent: GridPos { x: 15, y: 9 },
        },
        MapDefinition {
            name: "library",
            rows: LIBRARY_ROWS,
            spawn: GridPos { x: 1, y: 1 },
            safe_player: GridPos { x: 2, y: 1 },
            safe_agent: GridPos { x: 16, y: 3 },
        },
    ]
}
