use std::sync::Arc;

use super::geometry::GeometryStore;
use super::model::{
    DistrictError, DistrictLevel, DistrictNameEntry, DistrictNamesResponse,
    NearbyDistrictsResponse, UserDistrictInfo,
};
use super::resolver::DistrictResolver;
use super::slug::{resolve_slug, to_slug};

/// Read-side operations over the district reference data: level listings,
/// coordinate resolution and slug lookups. The geometry store bounds its
/// own queries with timeouts, so nothing here re-wraps them.
pub struct DistrictService {
    store: Arc<dyn GeometryStore>,
    resolver: DistrictResolver,
}

impl DistrictService {
    pub fn new(store: Arc<dyn GeometryStore>) -> Self {
        let resolver = DistrictResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// All districts at a level, each with its URL slug. Backs the level
    /// navigation pages and the filter dropdowns.
    pub async fn list_districts(
        &self,
        level: DistrictLevel,
    ) -> Result<DistrictNamesResponse, DistrictError> {
        let names = self.store.district_names(level).await?;
        let districts = names
            .into_iter()
            .map(|name| {
                let slug = to_slug(&name);
                DistrictNameEntry { name, slug }
            })
            .collect();

        Ok(DistrictNamesResponse { level, districts })
    }

    /// The districts containing a coordinate, one per level. Cached and
    /// coalesced by the resolver; a failed level comes back null rather
    /// than failing the call.
    pub async fn resolve_coordinate(&self, lat: f64, lng: f64) -> UserDistrictInfo {
        self.resolver.resolve_user_districts(lat, lng).await
    }

    /// Districts within radius_km of the coordinate, with GeoJSON
    /// boundaries for map display.
    pub async fn districts_near(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> Result<NearbyDistrictsResponse, DistrictError> {
        let districts = self.store.districts_near(lat, lng, radius_km).await?;
        Ok(NearbyDistrictsResponse { districts })
    }

    /// The canonical district name behind a level+slug pair.
    pub async fn canonical_name(
        &self,
        level: DistrictLevel,
        slug: &str,
    ) -> Result<String, DistrictError> {
        let names = self.store.district_names(level).await?;
        match resolve_slug(slug, names.iter().map(String::as_str)) {
            Some(name) => Ok(name.to_string()),
            None => Err(DistrictError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::district::geometry::MockGeometryStore;

    fn store_with_names(names: &'static [&'static str]) -> MockGeometryStore {
        let mut store = MockGeometryStore::new();
        store
            .expect_district_names()
            .returning(|_| Ok(names.iter().map(|name| name.to_string()).collect()));
        store
    }

    #[tokio::test]
    async fn listing_pairs_each_name_with_its_slug() {
        let store = store_with_names(&["Côte-des-Neiges", "Ville-Marie"]);
        let service = DistrictService::new(Arc::new(store));

        let listing = service
            .list_districts(DistrictLevel::Municipal)
            .await
            .unwrap();

        assert_eq!(listing.level, DistrictLevel::Municipal);
        assert_eq!(listing.districts.len(), 2);
        assert_eq!(listing.districts[0].name, "Côte-des-Neiges");
        assert_eq!(listing.districts[0].slug, "cote-des-neiges");
        assert_eq!(listing.districts[1].slug, "ville-marie");
    }

    #[tokio::test]
    async fn slug_resolves_to_the_canonical_name() {
        let store = store_with_names(&["Laurier—Sainte-Marie", "Outremont"]);
        let service = DistrictService::new(Arc::new(store));

        let name = service
            .canonical_name(DistrictLevel::Federal, "laurier-sainte-marie")
            .await
            .unwrap();

        assert_eq!(name, "Laurier—Sainte-Marie");
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let store = store_with_names(&["Outremont"]);
        let service = DistrictService::new(Arc::new(store));

        let err = service
            .canonical_name(DistrictLevel::Federal, "rosemont")
            .await
            .unwrap_err();

        assert!(matches!(err, DistrictError::NotFound));
    }
}
