//! The fixed output schema.
//!
//! Declaration order of [`Field`] is the column order of the result table, and
//! every record carries exactly these keys.

pub const NO_DATA: &str = "no data";
pub const NO_PROMOTIONS: &str = "no promotions";
pub const NOT_AVAILABLE: &str = "not available";
pub const IN_STOCK: &str = "in stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    // identity
    Article,
    Url,
    // scalar text
    Name,
    Price,
    Description,
    Rating,
    Reviews,
    // composite lists
    Colors,
    Sizes,
    Promotions,
    Availability,
    // parameter table
    Composition,
    Color,
    Gender,
    Season,
    ModelSize,
    ModelHeight,
    ModelMeasurements,
    Insulation,
    LiningMaterial,
    Fit,
    PocketType,
    Fastener,
    DecorativeElements,
    ModelFeatures,
    Care,
    PackageContents,
    CountryOfOrigin,
    ItemHeight,
    ItemDepth,
    ItemWidth,
    WeightWithPackaging,
}

use Field::*;

/// Every field in column order
pub const ALL_FIELDS: [Field; 32] = [
    Article,
    Url,
    Name,
    Price,
    Description,
    Rating,
    Reviews,
    Colors,
    Sizes,
    Promotions,
    Availability,
    Composition,
    Color,
    Gender,
    Season,
    ModelSize,
    ModelHeight,
    ModelMeasurements,
    Insulation,
    LiningMaterial,
    Fit,
    PocketType,
    Fastener,
    DecorativeElements,
    ModelFeatures,
    Care,
    PackageContents,
    CountryOfOrigin,
    ItemHeight,
    ItemDepth,
    ItemWidth,
    WeightWithPackaging,
];

/// Parameter labels looked up outside the parameter table when the scan missed them
pub const FALLBACK_FIELDS: [Field; 5] = [
    ItemHeight,
    ItemDepth,
    ItemWidth,
    WeightWithPackaging,
    CountryOfOrigin,
];

impl Field {
    /// Output column header
    pub fn column(&self) -> &'static str {
        match self {
            Article => "article",
            Url => "url",
            Name => "name",
            Price => "price",
            Description => "description",
            Rating => "rating",
            Reviews => "reviews",
            Colors => "colors",
            Sizes => "sizes",
            Promotions => "promotions",
            Availability => "availability",
            Composition => "composition",
            Color => "color",
            Gender => "gender",
            Season => "season",
            ModelSize => "model_size",
            ModelHeight => "model_height",
            ModelMeasurements => "model_measurements",
            Insulation => "insulation",
            LiningMaterial => "lining_material",
            Fit => "fit",
            PocketType => "pocket_type",
            Fastener => "fastener",
            DecorativeElements => "decorative_elements",
            ModelFeatures => "model_features",
            Care => "care",
            PackageContents => "package_contents",
            CountryOfOrigin => "country_of_origin",
            ItemHeight => "item_height",
            ItemDepth => "item_depth",
            ItemWidth => "item_width",
            WeightWithPackaging => "weight_with_packaging",
        }
    }

    /// Value a record holds until an extractor finds something better
    pub fn default_value(&self) -> &'static str {
        match self {
            Reviews => "0",
            Promotions => NO_PROMOTIONS,
            Availability => NOT_AVAILABLE,
            _ => NO_DATA,
        }
    }

    /// Row label used by the product page's parameter table
    pub fn spec_label(&self) -> Option<&'static str> {
        let label = match self {
            Composition => "Состав",
            Color => "Цвет",
            Gender => "Пол",
            Season => "Сезон",
            ModelSize => "Размер на модели",
            ModelHeight => "Рост модели на фото",
            ModelMeasurements => "Параметры модели на фото (ОГ-ОТ-ОБ)",
            Insulation => "Утеплитель",
            LiningMaterial => "Материал подкладки",
            Fit => "Тип посадки",
            PocketType => "Тип карманов",
            Fastener => "Вид застежки",
            DecorativeElements => "Декоративные элементы",
            ModelFeatures => "Особенности модели",
            Care => "Уход за вещами",
            PackageContents => "Комплектация",
            CountryOfOrigin => "Страна производства",
            ItemHeight => "Высота предмета",
            ItemDepth => "Глубина предмета",
            ItemWidth => "Ширина предмета",
            WeightWithPackaging => "Вес с упаковкой",
            _ => return None,
        };
        Some(label)
    }

    /// Map a parameter table label onto a schema field
    pub fn from_spec_label(label: &str) -> Option<Field> {
        let label = label.trim();
        ALL_FIELDS
            .iter()
            .copied()
            .find(|field| field.spec_label() == Some(label))
    }
}

/// Column headers in table order
pub fn columns() -> Vec<&'static str> {
    ALL_FIELDS.iter().map(Field::column).collect()
}
