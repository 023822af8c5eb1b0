//! Interactive software-rasterizer viewer.
//!
//! ```bash
//! cargo run --release -- --width 1280 --height 800 --filter bilinear
//! ```
//!
//! WASD / arrows move, Q/E turn, R/F look up/down, Escape quits.

use std::time::{Duration, Instant};

use clap::Parser;
use glam::{Mat4, vec3};
use minifb::{Key, Window, WindowOptions};

use softpoly::{
    renderer::{Renderer, Software, software::{Filter, LaneWidth}},
    world::{Camera, Mesh, Node, NodeId, Scene, Texture, TextureBank, ground_quad, unit_cube},
};

#[derive(Parser)]
#[command(about = "softpoly demo scene")]
struct Args {
    #[arg(long, default_value_t = 1280)]
    width: usize,
    #[arg(long, default_value_t = 800)]
    height: usize,
    /// nearest | bilinear
    #[arg(long, default_value = "nearest")]
    filter: String,
    /// Force the lane width instead of auto-detecting (4 or 8).
    #[arg(long)]
    lanes: Option<usize>,
}

const MOVE_SPEED: f32 = 4.0; // units per second
const TURN_SPEED: f32 = 1.6; // radians per second

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let filter = match args.filter.as_str() {
        "nearest" => Filter::Nearest,
        "bilinear" => Filter::Bilinear,
        other => anyhow::bail!("unknown filter `{other}`"),
    };

    // keep stride == width so the loaned buffer maps 1:1 onto the window
    let width = (args.width + 7) & !7;
    let height = args.height;

    let mut renderer = match args.lanes {
        None => Software::new(),
        Some(4) => Software::with_lanes(LaneWidth::X4),
        Some(8) => Software::with_lanes(LaneWidth::X8),
        Some(n) => anyhow::bail!("unsupported lane width {n}"),
    };
    renderer.filter = filter;

    // ─────────── content: bank + scene ───────────
    let mut bank = TextureBank::default_with_checker();
    let bricks = bank.insert("BRICKS", brick_texture())?;
    let tiles = bank.insert("TILES", tile_texture())?;

    let mut scene = Scene::default();
    let brick_mat = scene.add_textured_material(bricks);
    let tile_mat = scene.add_textured_material(tiles);

    let floor = scene.add_mesh(Mesh {
        primitives: vec![ground_quad(16.0, 8.0, Some(tile_mat))],
    });
    let cube = scene.add_mesh(Mesh {
        primitives: vec![unit_cube(Some(brick_mat))],
    });

    let floor_node = scene.add_node(Node::with_mesh(
        Mat4::from_translation(vec3(0.0, -1.0, 0.0)),
        floor,
    ));
    scene.roots.push(floor_node);

    // a small ring of cubes that the loop below keeps spinning
    let mut spinners: Vec<NodeId> = Vec::new();
    for i in 0..5 {
        let angle = i as f32 / 5.0 * std::f32::consts::TAU;
        let id = scene.add_node(Node::with_mesh(
            cube_pose(angle, 0.0),
            cube,
        ));
        scene.roots.push(id);
        spinners.push(id);
    }
    scene.validate()?;

    let mut camera = Camera::new(vec3(0.0, 0.5, 6.0), 0.0, 70_f32.to_radians(), 0.1, 100.0);

    let mut win = Window::new(
        "softpoly software renderer",
        width,
        height,
        WindowOptions::default(),
    )?;
    win.set_target_fps(60);

    // ────────────────── benchmarking state ──────────────────────────────
    let mut acc_time = Duration::ZERO; // cumulated render time
    let mut acc_frames = 0usize; // frames in the current window
    let mut last_print = Instant::now(); // when we printed last
    let mut last_frame = Instant::now();
    let mut spin = 0.0f32;

    while win.is_open() && !win.is_key_down(Key::Escape) {
        let dt = last_frame.elapsed().as_secs_f32().min(0.1);
        last_frame = Instant::now();
        let t0 = Instant::now(); // ┌─ frame timer start

        /* movement --------------------------------------------------------- */
        let mut forward = 0.0;
        let mut side = 0.0;
        if win.is_key_down(Key::Up) || win.is_key_down(Key::W) {
            forward += MOVE_SPEED * dt;
        }
        if win.is_key_down(Key::Down) || win.is_key_down(Key::S) {
            forward -= MOVE_SPEED * dt;
        }
        if win.is_key_down(Key::Left) || win.is_key_down(Key::A) {
            side -= MOVE_SPEED * dt;
        }
        if win.is_key_down(Key::Right) || win.is_key_down(Key::D) {
            side += MOVE_SPEED * dt;
        }
        camera.step(forward, side);

        let mut yaw = 0.0;
        let mut pitch = 0.0;
        if win.is_key_down(Key::Q) {
            yaw += TURN_SPEED * dt;
        }
        if win.is_key_down(Key::E) {
            yaw -= TURN_SPEED * dt;
        }
        if win.is_key_down(Key::R) {
            pitch += TURN_SPEED * dt;
        }
        if win.is_key_down(Key::F) {
            pitch -= TURN_SPEED * dt;
        }
        camera.turn(yaw, pitch);

        /* animate: node locals only ever change here, between frames ------ */
        spin += dt;
        for (i, &id) in spinners.iter().enumerate() {
            let angle = i as f32 / spinners.len() as f32 * std::f32::consts::TAU;
            scene.nodes[id as usize].local = cube_pose(angle, spin * (1.0 + i as f32 * 0.3));
        }

        /* draw */
        renderer.begin_frame(width, height);
        renderer.draw_scene(&scene, &camera, &bank);
        renderer.end_frame(|fb, stride, h| {
            acc_time += t0.elapsed();
            acc_frames += 1;
            win.update_with_buffer(fb, stride, h).unwrap()
        });

        if last_print.elapsed() >= Duration::from_secs(3) {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames as f64;
            let fps = 1000.0 / avg_ms;
            println!("avg render: {:.2} ms  ({:.1} FPS)", avg_ms, fps);
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}

/// Place one ring cube: orbit position plus its own tumble.
fn cube_pose(orbit: f32, tumble: f32) -> Mat4 {
    Mat4::from_translation(vec3(orbit.cos() * 3.0, 0.0, orbit.sin() * 3.0 - 2.0))
        * Mat4::from_rotation_y(tumble)
        * Mat4::from_rotation_x(tumble * 0.6)
}

/// Procedural stand-ins for the out-of-scope asset loader.
fn brick_texture() -> Texture {
    Texture::from_fn("BRICKS", 64, 64, |x, y| {
        let row = y / 16;
        let shift = if row % 2 == 0 { 0 } else { 16 };
        let mortar = y % 16 < 2 || (x + shift) % 32 < 2;
        if mortar {
            0xFF_B0_A8_98
        } else {
            let shade = ((x * 7 + y * 13) % 23) as u32;
            0xFF_A0_40_30 + (shade << 16)
        }
    })
}

fn tile_texture() -> Texture {
    Texture::from_fn("TILES", 64, 64, |x, y| {
        if (x / 32 + y / 32) % 2 == 0 {
            0xFF_60_70_80
        } else {
            0xFF_30_38_40
        }
    })
}
