//! 平面几何基础运算
//!
//! 简化、平滑和连接只在平面上比较距离和角度，统一使用 nalgebra 的二维类型。

/// 二维点
pub type Point2 = nalgebra::Point2<f64>;

/// 三维向量（地心坐标）
pub type Vector3 = nalgebra::Vector3<f64>;

/// 浮点比较容差
pub const EPSILON: f64 = 1e-10;

/// 计算点到线段的距离
///
/// 线段退化为一个点时返回到该点的距离。
pub fn distance_to_segment(point: &Point2, start: &Point2, end: &Point2) -> f64 {
    let v = end - start;
    let w = point - start;

    let c1 = w.dot(&v);
    if c1 <= 0.0 {
        return (point - start).norm();
    }

    let c2 = v.dot(&v);
    if c2 <= c1 {
        return (point - end).norm();
    }

    let b = c1 / c2;
    let pb = start + v * b;
    (point - pb).norm()
}

/// 计算顶点处的夹角（度）
///
/// 夹角是从顶点指向前一点和后一点两个向量之间的角度，
/// 180° 表示三点共线且方向不变，0° 表示原路折返。
/// 任一相邻边长度为零时返回 `None`。
pub fn vertex_angle(prev: &Point2, vertex: &Point2, next: &Point2) -> Option<f64> {
    let a = prev - vertex;
    let b = next - vertex;
    let na = a.norm();
    let nb = b.norm();
    if na < EPSILON || nb < EPSILON {
        return None;
    }
    let cos = (a.dot(&b) / (na * nb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}
