use crate::rect::Rect;

/// Relative tolerance used when clustering raw window hits.
pub(crate) const GROUP_EPS: f64 = 0.2;

fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

/// Label each rectangle with an equivalence class under [`similar`].
///
/// Classes are numbered in order of their first member. Returns the labels
/// and the class count.
fn partition(rects: &[Rect], eps: f64) -> (Vec<usize>, usize) {
    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0u32; n];

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if !similar(&rects[i], &rects[j], eps) {
                continue;
            }
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri == rj {
                continue;
            }
            match rank[ri].cmp(&rank[rj]) {
                std::cmp::Ordering::Less => parent[ri] = rj,
                std::cmp::Ordering::Greater => parent[rj] = ri,
                std::cmp::Ordering::Equal => {
                    parent[rj] = ri;
                    rank[ri] += 1;
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = classes;
            classes += 1;
        }
        labels.push(class_of_root[root]);
    }
    (labels, classes)
}

/// Cluster overlapping raw hits into detections.
///
/// Each cluster is replaced by its member-wise average. Clusters with
/// `min_neighbors` or fewer members are dropped, as are clusters that sit
/// inside a clearly stronger one. `min_neighbors == 0` returns `rects` as-is.
pub(crate) fn group_rectangles(rects: &[Rect], min_neighbors: u32, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, classes) = partition(rects, eps);
    let mut totals = vec![[0i64; 4]; classes];
    let mut weights = vec![0u32; classes];
    for (rect, &class) in rects.iter().zip(&labels) {
        let t = &mut totals[class];
        t[0] += rect.x as i64;
        t[1] += rect.y as i64;
        t[2] += rect.width as i64;
        t[3] += rect.height as i64;
        weights[class] += 1;
    }

    let averaged: Vec<Rect> = totals
        .iter()
        .zip(&weights)
        .map(|(t, &n)| {
            let scale = 1.0 / n as f64;
            let avg = |v: i64| (v as f64 * scale).round_ties_even() as i32;
            Rect::new(avg(t[0]), avg(t[1]), avg(t[2]), avg(t[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = weights[i];
        if n1 <= min_neighbors {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = weights[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round_ties_even() as i32;
            let dy = (r2.height as f64 * eps).round_ties_even() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}
