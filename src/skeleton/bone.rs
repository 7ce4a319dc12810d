use std::fmt;

use strum::{EnumIter, IntoEnumIterator};

/// 左右
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// ボーン名の接頭辞
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Left => "左",
            Side::Right => "右",
        }
    }

    /// 左 = -1, 右 = +1
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub fn is_left(self) -> bool {
        self == Side::Left
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// 指
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// 1 本あたりの関節数
    pub const JOINTS: usize = 3;

    pub fn label(self) -> &'static str {
        match self {
            Finger::Thumb => "親指",
            Finger::Index => "人指",
            Finger::Middle => "中指",
            Finger::Ring => "薬指",
            Finger::Pinky => "小指",
        }
    }

    /// MMD の関節番号。親指は ０ から、他は １ から始まる。
    pub fn first_joint_number(self) -> u8 {
        match self {
            Finger::Thumb => 0,
            _ => 1,
        }
    }

    /// 手ランドマークでの付け根インデックス
    pub fn landmark_base(self) -> usize {
        crate::landmark::HandLandmark::FINGER_BASES[self as usize]
    }

    pub fn is_thumb(self) -> bool {
        self == Finger::Thumb
    }
}

fn full_width_digit(n: u8) -> char {
    char::from_u32('０' as u32 + n as u32).unwrap_or('０')
}

/// リターゲット対象のボーン（閉じた集合）
///
/// 表示名は PMX/MMD 標準の日本語ボーン名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bone {
    Root,
    LowerBody,
    UpperBody,
    Neck,
    Head,
    Eye(Side),
    Arm(Side),
    Elbow(Side),
    Wrist(Side),
    Leg(Side),
    Knee(Side),
    Ankle(Side),
    FootIk(Side),
    /// 指の関節。joint は 0 始まり（0 が付け根）。
    Finger(Side, Finger, u8),
}

impl Bone {
    /// 全ボーン（親が子より先に並ぶ）
    pub fn all() -> Vec<Bone> {
        let mut bones = vec![Bone::Root, Bone::LowerBody, Bone::UpperBody, Bone::Neck, Bone::Head];
        for side in Side::iter() {
            bones.push(Bone::Eye(side));
        }
        for side in Side::iter() {
            bones.extend([Bone::Arm(side), Bone::Elbow(side), Bone::Wrist(side)]);
        }
        for side in Side::iter() {
            bones.extend([Bone::Leg(side), Bone::Knee(side), Bone::Ankle(side), Bone::FootIk(side)]);
        }
        for side in Side::iter() {
            for finger in Finger::iter() {
                for joint in 0..Finger::JOINTS as u8 {
                    bones.push(Bone::Finger(side, finger, joint));
                }
            }
        }
        bones
    }

    /// バインドに必須のボーン
    pub fn required() -> Vec<Bone> {
        Self::all().into_iter().filter(|b| b.is_required()).collect()
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Bone::Eye(_) | Bone::Finger(..))
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Bone::Root | Bone::LowerBody | Bone::UpperBody | Bone::Neck | Bone::Head => None,
            Bone::Eye(s)
            | Bone::Arm(s)
            | Bone::Elbow(s)
            | Bone::Wrist(s)
            | Bone::Leg(s)
            | Bone::Knee(s)
            | Bone::Ankle(s)
            | Bone::FootIk(s)
            | Bone::Finger(s, _, _) => Some(s),
        }
    }

    /// 階層上の親
    pub fn parent(self) -> Option<Bone> {
        match self {
            Bone::Root => None,
            Bone::LowerBody | Bone::FootIk(_) => Some(Bone::Root),
            Bone::UpperBody | Bone::Leg(_) => Some(Bone::LowerBody),
            Bone::Neck | Bone::Arm(_) => Some(Bone::UpperBody),
            Bone::Head => Some(Bone::Neck),
            Bone::Eye(_) => Some(Bone::Head),
            Bone::Elbow(s) => Some(Bone::Arm(s)),
            Bone::Wrist(s) => Some(Bone::Elbow(s)),
            Bone::Knee(s) => Some(Bone::Leg(s)),
            Bone::Ankle(s) => Some(Bone::Knee(s)),
            Bone::Finger(s, _, 0) => Some(Bone::Wrist(s)),
            Bone::Finger(s, f, j) => Some(Bone::Finger(s, f, j - 1)),
        }
    }

    /// MMD 表示名
    pub fn name(self) -> String {
        match self {
            Bone::Root => "全ての親".to_string(),
            Bone::LowerBody => "下半身".to_string(),
            Bone::UpperBody => "上半身".to_string(),
            Bone::Neck => "首".to_string(),
            Bone::Head => "頭".to_string(),
            Bone::Eye(s) => format!("{}目", s.prefix()),
            Bone::Arm(s) => format!("{}腕", s.prefix()),
            Bone::Elbow(s) => format!("{}ひじ", s.prefix()),
            Bone::Wrist(s) => format!("{}手首", s.prefix()),
            Bone::Leg(s) => format!("{}足", s.prefix()),
            Bone::Knee(s) => format!("{}ひざ", s.prefix()),
            Bone::Ankle(s) => format!("{}足首", s.prefix()),
            Bone::FootIk(s) => format!("{}足ＩＫ", s.prefix()),
            Bone::Finger(s, f, j) => format!(
                "{}{}{}",
                s.prefix(),
                f.label(),
                full_width_digit(f.first_joint_number() + j)
            ),
        }
    }

    pub fn from_name(name: &str) -> Option<Bone> {
        Self::all().into_iter().find(|b| b.name() == name)
    }

    /// VMD 書き出しで位置を保持するボーン
    pub fn keeps_position(self) -> bool {
        matches!(self, Bone::Root | Bone::FootIk(_) | Bone::Arm(_))
    }
}

impl fmt::Display for Bone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
