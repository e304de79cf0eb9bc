use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use mvmesh::api::MvGrid;
use mvmesh::bench::frame::*;
use mvmesh::bench::mc::*;

criterion_group!(mc, bench_pred_block_split, bench_pred_block_whole);

fn fill_plane<T: Pixel>(ra: &mut ChaChaRng, plane: &mut Plane<T>) {
    let stride = plane.cfg.stride;
    for row in plane.data.chunks_mut(stride) {
        for pixel in row {
            let v: u8 = ra.gen();
            *pixel = T::cast_from(v);
        }
    }
}

fn new_plane<T: Pixel>(ra: &mut ChaChaRng, width: usize, height: usize) -> Plane<T> {
    let mut p = Plane::new(width, height, 0, 0);

    fill_plane(ra, &mut p);

    p
}

fn random_grid(ra: &mut ChaChaRng, nhmbs: usize, nvmbs: usize) -> MvGrid {
    let mut grid = MvGrid::new(nhmbs, nvmbs).unwrap();
    for vy in 0..=grid.nvmvbs() {
        for vx in 0..=grid.nhmvbs() {
            let pt = &mut grid[(vx, vy)];
            pt.valid = true;
            pt.mv = [ra.gen_range(-64, 64), ra.gen_range(-64, 64)];
        }
    }
    grid
}

fn bench_pred_block_split(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let plane = new_plane::<u16>(&mut ra, 1280, 960);
    let grid = random_grid(&mut ra, 40, 30);
    let mut pred = [[0; MAX_BLK_SIZE]; MAX_BLK_SIZE];

    c.bench_function("pred_block_4x4_split", |b| {
        b.iter(|| {
            let _ = black_box(pred_block(&mut pred, &plane, &grid, 9, 9, 2, 1, 0));
        })
    });
}

fn bench_pred_block_whole(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([1; 32]);
    let plane = new_plane::<u16>(&mut ra, 1280, 960);
    let grid = random_grid(&mut ra, 40, 30);
    let mut pred = [[0; MAX_BLK_SIZE]; MAX_BLK_SIZE];

    c.bench_function("pred_block_16x16", |b| {
        b.iter(|| {
            let _ = black_box(pred_block(&mut pred, &plane, &grid, 8, 8, 0, 3, 2));
        })
    });
}
